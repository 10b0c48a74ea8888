use crate::error::ProjError;
use crate::pj::_string;
use libc::c_char;
use std::sync::OnceLock;

/// An oblate ellipsoid of revolution.
///
/// Invariants: the semi-major axis is finite and positive and the flattening lies in
/// `[0, 1)`. A sphere has an inverse flattening of `0`, as PROJ reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    name: String,
    semi_major: f64,
    semi_minor: f64,
    inverse_flattening: f64,
    is_semi_minor_computed: bool,
}

impl Ellipsoid {
    /// Ellipsoid from its semi-major axis and inverse flattening (`0` for a sphere).
    pub fn from_inverse_flattening(
        name: impl Into<String>,
        semi_major: f64,
        inverse_flattening: f64,
    ) -> Result<Self, ProjError> {
        let flattening = if inverse_flattening == 0.0 {
            0.0
        } else {
            1.0 / inverse_flattening
        };
        check_shape(semi_major, flattening)?;
        Ok(Ellipsoid {
            name: name.into(),
            semi_major,
            semi_minor: semi_major * (1.0 - flattening),
            inverse_flattening,
            is_semi_minor_computed: true,
        })
    }

    /// Ellipsoid from both of its semi-axes.
    pub fn from_semi_axes(
        name: impl Into<String>,
        semi_major: f64,
        semi_minor: f64,
    ) -> Result<Self, ProjError> {
        let flattening = (semi_major - semi_minor) / semi_major;
        check_shape(semi_major, flattening)?;
        Ok(Ellipsoid {
            name: name.into(),
            semi_major,
            semi_minor,
            inverse_flattening: if flattening == 0.0 { 0.0 } else { 1.0 / flattening },
            is_semi_minor_computed: false,
        })
    }

    pub(crate) fn from_parameters(
        name: String,
        semi_major: f64,
        semi_minor: f64,
        inverse_flattening: f64,
        is_semi_minor_computed: bool,
    ) -> Result<Self, ProjError> {
        if is_semi_minor_computed {
            Ellipsoid::from_inverse_flattening(name, semi_major, inverse_flattening)
        } else {
            Ellipsoid::from_semi_axes(name, semi_major, semi_minor)
        }
    }

    /// One of the ellipsoids PROJ knows by its `+ellps=` name.
    pub fn named(ellps: &str) -> Result<Self, ProjError> {
        let named = named_ellipsoids()
            .iter()
            .find(|named| named.id == ellps)
            .ok_or_else(|| ProjError::InvalidArgument(format!("unknown ellipsoid {ellps:?}")))?;
        match named.shape {
            Shape::InverseFlattening(rf) => {
                Ellipsoid::from_inverse_flattening(ellps, named.semi_major, rf)
            }
            Shape::SemiMinor(b) => Ellipsoid::from_semi_axes(ellps, named.semi_major, b),
        }
    }

    pub fn wgs84() -> Self {
        Ellipsoid {
            name: "WGS84".to_string(),
            semi_major: 6378137.0,
            semi_minor: 6378137.0 * (1.0 - 1.0 / 298.257223563),
            inverse_flattening: 298.257223563,
            is_semi_minor_computed: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semi-major axis in metres.
    pub fn semi_major(&self) -> f64 {
        self.semi_major
    }

    /// Semi-minor axis in metres.
    pub fn semi_minor(&self) -> f64 {
        self.semi_minor
    }

    pub fn inverse_flattening(&self) -> f64 {
        self.inverse_flattening
    }

    /// Whether the semi-minor axis was derived from the inverse flattening.
    pub fn is_semi_minor_computed(&self) -> bool {
        self.is_semi_minor_computed
    }

    pub fn flattening(&self) -> f64 {
        if self.inverse_flattening == 0.0 {
            0.0
        } else {
            1.0 / self.inverse_flattening
        }
    }

    pub fn eccentricity_squared(&self) -> f64 {
        let f = self.flattening();
        f * (2.0 - f)
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity_squared().sqrt()
    }

    pub fn is_sphere(&self) -> bool {
        self.flattening() == 0.0
    }
}

fn check_shape(semi_major: f64, flattening: f64) -> Result<(), ProjError> {
    if !(semi_major.is_finite() && semi_major > 0.0) {
        return Err(ProjError::InvalidArgument(format!(
            "semi-major axis must be positive, got {semi_major}"
        )));
    }
    if !(0.0..1.0).contains(&flattening) {
        return Err(ProjError::InvalidArgument(format!(
            "flattening must lie in [0, 1), got {flattening}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    InverseFlattening(f64),
    SemiMinor(f64),
}

#[derive(Debug)]
struct NamedEllipsoid {
    id: String,
    semi_major: f64,
    shape: Shape,
}

/// PROJ's built-in ellipsoid table (`proj -le`), read once from the linked library.
fn named_ellipsoids() -> &'static [NamedEllipsoid] {
    static TABLE: OnceLock<Vec<NamedEllipsoid>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::new();
        let mut entry = unsafe { proj_sys::proj_list_ellps() };
        if entry.is_null() {
            log::warn!("PROJ returned no ellipsoid table");
            return table;
        }
        // the list ends with an entry whose id is null
        while let Some(id) = unsafe { field((*entry).id) } {
            let (major, ell) = unsafe { (field((*entry).major), field((*entry).ell)) };
            match parse_entry(major.as_deref(), ell.as_deref()) {
                Some((semi_major, shape)) => table.push(NamedEllipsoid {
                    id,
                    semi_major,
                    shape,
                }),
                None => log::debug!("skipping ellipsoid {id}: {major:?} {ell:?}"),
            }
            entry = unsafe { entry.add(1) };
        }
        table
    })
}

unsafe fn field(raw_ptr: *const c_char) -> Option<String> {
    if raw_ptr.is_null() {
        None
    } else {
        unsafe { _string(raw_ptr) }.ok()
    }
}

/// Reads the `a=` and `rf=` / `b=` parameters of one table entry.
fn parse_entry(major: Option<&str>, ell: Option<&str>) -> Option<(f64, Shape)> {
    let semi_major = major?.trim().strip_prefix("a=")?.parse().ok()?;
    let (key, value) = ell?.trim().split_once('=')?;
    let value = value.parse().ok()?;
    let shape = match key {
        "rf" => Shape::InverseFlattening(value),
        "b" => Shape::SemiMinor(value),
        _ => return None,
    };
    Some((semi_major, shape))
}

/// Names accepted by [`Ellipsoid::named`].
pub fn ellipsoid_names() -> impl Iterator<Item = &'static str> {
    named_ellipsoids().iter().map(|named| named.id.as_str())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_named_wgs84_matches_constructor() {
        let named = Ellipsoid::named("WGS84").unwrap();
        assert_eq!(named, Ellipsoid::wgs84());
        assert_relative_eq!(named.semi_minor(), 6356752.314245179, epsilon = 1e-6);
        assert_relative_eq!(named.eccentricity_squared(), 0.0066943799901413165, epsilon = 1e-15);
    }

    #[test]
    fn test_semi_axes_ellipsoid() {
        let clarke = Ellipsoid::named("clrk66").unwrap();
        assert!(!clarke.is_semi_minor_computed());
        assert_relative_eq!(clarke.inverse_flattening(), 294.978698213898, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere() {
        let sphere = Ellipsoid::named("sphere").unwrap();
        assert!(sphere.is_sphere());
        assert_eq!(sphere.inverse_flattening(), 0.0);
        assert_eq!(sphere.eccentricity(), 0.0);
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(Ellipsoid::from_inverse_flattening("bad", -1.0, 298.0).is_err());
        assert!(Ellipsoid::from_inverse_flattening("bad", f64::NAN, 298.0).is_err());
        assert!(Ellipsoid::from_semi_axes("prolate", 6378137.0, 6400000.0).is_err());
        assert!(Ellipsoid::from_inverse_flattening("flat", 6378137.0, 1.0).is_err());
        assert!(Ellipsoid::named("potato").is_err());
    }

    #[test]
    fn test_table_comes_from_proj() {
        let names: Vec<&str> = ellipsoid_names().collect();
        for expected in ["WGS84", "GRS80", "clrk66", "intl", "bessel", "sphere"] {
            assert!(names.contains(&expected), "{expected}");
        }
        for name in names {
            assert!(Ellipsoid::named(name).is_ok(), "{name}");
        }
        assert_relative_eq!(
            Ellipsoid::named("GRS80").unwrap().inverse_flattening(),
            298.257222101,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_parse_entry() {
        assert_eq!(
            parse_entry(Some("a=6378137.0"), Some("rf=298.257223563")),
            Some((6378137.0, Shape::InverseFlattening(298.257223563)))
        );
        assert_eq!(
            parse_entry(Some("a=6378206.4"), Some("b=6356583.8")),
            Some((6378206.4, Shape::SemiMinor(6356583.8)))
        );
        assert_eq!(parse_entry(Some("a=6378137.0"), Some("es=0.006694")), None);
        assert_eq!(parse_entry(Some("R=6371000"), Some("rf=300")), None);
        assert_eq!(parse_entry(None, Some("rf=300")), None);
    }
}
