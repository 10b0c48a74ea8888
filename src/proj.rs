use crate::crs::{Crs, CrsKind};
use crate::error::ProjError;
use crate::pj::{Direction, Operation, Pj};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Unit of the angular (longitude / latitude) side of a [`Proj`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    fn to_radians(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_radians(),
            AngleUnit::Radians => angle,
        }
    }

    fn from_radians(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_degrees(),
            AngleUnit::Radians => angle,
        }
    }
}

/// Forward and inverse mapping between geographic coordinates and the native coordinates
/// of one CRS.
///
/// The forward direction takes longitude first, whatever the axis order of the CRS. For a
/// geographic CRS the mapping is the identity, for a geocentric CRS it is the conversion to
/// Earth-centred cartesian coordinates.
///
/// # Examples
///
/// ```
/// # use approx::assert_relative_eq;
/// use geoproj::{Crs, Proj};
///
/// let utm = Proj::new(&Crs::from_epsg(32633).unwrap()).unwrap();
/// let (x, y, _) = utm.forward(15.0, 0.0, None).unwrap();
/// assert_relative_eq!(x, 500000.0, epsilon = 1e-6);
/// assert_relative_eq!(y, 0.0, epsilon = 1e-6);
///
/// let (lon, lat, _) = utm.inverse(x, y, None).unwrap();
/// assert_relative_eq!(lon, 15.0, epsilon = 1e-9);
/// assert_relative_eq!(lat, 0.0, epsilon = 1e-9);
/// ```
pub struct Proj {
    crs: Crs,
    operation: Mutex<Operation>,
    has_inverse: bool,
    definition: Option<String>,
    declared_unit: AngleUnit,
    angle_unit: AngleUnit,
}

impl Proj {
    /// Builds the projection of `crs`.
    ///
    /// Fails with [`ProjError::NotGeographic`] for CRSs with no geodetic basis, such as
    /// engineering or purely vertical CRSs.
    pub fn new(crs: &Crs) -> Result<Self, ProjError> {
        if crs.kind() == CrsKind::Other {
            return Err(ProjError::NotGeographic(crs.name().to_string()));
        }
        let operation_definition = operation_definition(&crs.to_proj_string()?);
        let operation = Operation::build(crs.data_dir(), |ctx| {
            Pj::from_definition(ctx.clone(), &operation_definition)
        })?;
        let declared_unit = declared_angle_unit(crs)?;
        Ok(Proj {
            crs: crs.clone(),
            has_inverse: operation.has_inverse(),
            definition: operation.definition(),
            operation: Mutex::new(operation),
            declared_unit,
            angle_unit: declared_unit,
        })
    }

    /// Forces the unit of longitudes and latitudes, whatever the CRS declares.
    ///
    /// A conflict with the declared unit is logged as a warning.
    pub fn with_angle_unit(mut self, unit: AngleUnit) -> Self {
        if unit != self.declared_unit {
            log::warn!(
                "{} declares {:?} for its geographic axes, reading and writing {:?} instead",
                self.crs.name(),
                self.declared_unit,
                unit
            );
        }
        self.angle_unit = unit;
        self
    }

    pub fn angle_unit(&self) -> AngleUnit {
        self.angle_unit
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn has_inverse(&self) -> bool {
        self.has_inverse
    }

    pub fn is_geographic(&self) -> bool {
        self.crs.is_geographic()
    }

    pub fn is_geocentric(&self) -> bool {
        self.crs.is_geocentric()
    }

    /// PROJ's own description of the operation, e.g. `proj=utm zone=33 datum=WGS84`.
    pub fn definition_string(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// Projects geographic coordinates to the native coordinates of the CRS.
    ///
    /// The height is passed through (or used, for geocentric CRSs) and returned when given.
    pub fn forward(
        &self,
        lon: f64,
        lat: f64,
        height: Option<f64>,
    ) -> Result<(f64, f64, Option<f64>), ProjError> {
        self.apply(Direction::Forward, lon, lat, height)
    }

    /// Maps native coordinates back to longitude and latitude.
    ///
    /// Fails with [`ProjError::NoInverse`] when the projection is one-way.
    pub fn inverse(
        &self,
        x: f64,
        y: f64,
        z: Option<f64>,
    ) -> Result<(f64, f64, Option<f64>), ProjError> {
        if !self.has_inverse {
            return Err(ProjError::NoInverse(
                self.definition
                    .clone()
                    .unwrap_or_else(|| self.crs.name().to_string()),
            ));
        }
        self.apply(Direction::Inverse, x, y, z)
    }

    fn apply(
        &self,
        direction: Direction,
        x: f64,
        y: f64,
        z: Option<f64>,
    ) -> Result<(f64, f64, Option<f64>), ProjError> {
        let mut operation = self.operation();
        let (x, y) = if operation.angular_input(direction) {
            (self.angle_unit.to_radians(x), self.angle_unit.to_radians(y))
        } else {
            (x, y)
        };
        let (x2, y2, z2) = operation.trans(direction, x, y, z.unwrap_or(0.0))?;
        let (x2, y2) = if operation.angular_output(direction) {
            (
                self.angle_unit.from_radians(x2),
                self.angle_unit.from_radians(y2),
            )
        } else {
            (x2, y2)
        };
        Ok((x2, y2, z.map(|_| z2)))
    }

    fn operation(&self) -> MutexGuard<'_, Operation> {
        self.operation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The projection of the longitude/latitude CRS sharing this CRS's datum.
    pub fn to_geographic_equivalent(&self) -> Result<Proj, ProjError> {
        let geographic = Proj::new(&self.crs.geographic_crs()?)?;
        Ok(Proj {
            angle_unit: self.angle_unit,
            ..geographic
        })
    }

    /// Alias of [`to_geographic_equivalent`](Self::to_geographic_equivalent).
    pub fn to_latlong(&self) -> Result<Proj, ProjError> {
        self.to_geographic_equivalent()
    }
}

impl std::fmt::Debug for Proj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proj")
            .field("crs", &self.crs)
            .field("definition", &self.definition)
            .field("angle_unit", &self.angle_unit)
            .finish()
    }
}

/// The PROJ string of a CRS, read as an operation rather than a CRS.
fn operation_definition(crs_definition: &str) -> String {
    crs_definition
        .split_whitespace()
        .filter(|token| token.trim_start_matches('+') != "type=crs")
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unit of the geographic axes the CRS is based on.
fn declared_angle_unit(crs: &Crs) -> Result<AngleUnit, ProjError> {
    let geodetic;
    let base = if crs.is_geographic() {
        crs
    } else {
        geodetic = crs.to_geodetic()?;
        &geodetic
    };
    let in_radians = base
        .axis_info()?
        .iter()
        .any(|axis| axis.unit_name.eq_ignore_ascii_case("radian"));
    Ok(if in_radians {
        AngleUnit::Radians
    } else {
        AngleUnit::Degrees
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn proj(definition: &str) -> Proj {
        Proj::new(&Crs::from_string(definition).unwrap()).unwrap()
    }

    #[test]
    fn test_proj_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Proj>();
    }

    #[test]
    fn test_operation_definition() {
        assert_eq!(
            operation_definition("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs +type=crs"),
            "+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs"
        );
    }

    #[test]
    fn test_utm_roundtrip() {
        let utm = proj("EPSG:32633");
        assert!(!utm.is_geographic());
        assert!(utm.has_inverse());
        assert!(utm.definition_string().unwrap().contains("proj=utm"));
        let (x, y, z) = utm.forward(16.0, 48.0, None).unwrap();
        assert!(z.is_none());
        let (lon, lat, _) = utm.inverse(x, y, None).unwrap();
        assert_relative_eq!(lon, 16.0, epsilon = 1e-9);
        assert_relative_eq!(lat, 48.0, epsilon = 1e-9);
    }

    #[test]
    fn test_geographic_is_identity() {
        let wgs84 = proj("EPSG:4326");
        assert!(wgs84.is_geographic());
        let (lon, lat, h) = wgs84.forward(2.35, 48.85, Some(35.0)).unwrap();
        assert_relative_eq!(lon, 2.35, epsilon = 1e-12);
        assert_relative_eq!(lat, 48.85, epsilon = 1e-12);
        assert_eq!(h, Some(35.0));
    }

    #[test]
    fn test_geocentric() {
        let ecef = proj("EPSG:4978");
        assert!(ecef.is_geocentric());
        let (x, y, z) = ecef.forward(0.0, 0.0, Some(0.0)).unwrap();
        assert_relative_eq!(x, 6378137.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(z.unwrap(), 0.0, epsilon = 1e-6);
        let (lon, lat, h) = ecef.inverse(0.0, 0.0, Some(6356752.314245179)).unwrap();
        assert_relative_eq!(lat, 90.0, epsilon = 1e-9);
        assert_relative_eq!(h.unwrap(), 0.0, epsilon = 1e-6);
        assert!(lon.is_finite());
    }

    #[test]
    fn test_radian_override() {
        let utm = proj("EPSG:32633").with_angle_unit(AngleUnit::Radians);
        assert_eq!(utm.angle_unit(), AngleUnit::Radians);
        let (x, _, _) = utm.forward(15f64.to_radians(), 0.0, None).unwrap();
        assert_relative_eq!(x, 500000.0, epsilon = 1e-6);

        let wgs84 = proj("EPSG:4326").with_angle_unit(AngleUnit::Radians);
        let (lon, lat, _) = wgs84.forward(0.1, 0.2, None).unwrap();
        assert_relative_eq!(lon, 0.1, epsilon = 1e-15);
        assert_relative_eq!(lat, 0.2, epsilon = 1e-15);
    }

    #[test]
    fn test_no_inverse() {
        let bacon = proj("+proj=bacon +R=6400000 +units=m +no_defs");
        assert!(!bacon.has_inverse());
        assert!(bacon.forward(10.0, 10.0, None).is_ok());
        assert!(matches!(
            bacon.inverse(1000.0, 1000.0, None),
            Err(ProjError::NoInverse(_))
        ));
    }

    #[test]
    fn test_out_of_domain() {
        let merc = proj("EPSG:3857");
        assert!(matches!(
            merc.forward(0.0, 90.0, None),
            Err(ProjError::PointOutOfDomain(_))
        ));
    }

    #[test]
    fn test_to_geographic_equivalent() {
        let utm = proj("EPSG:32633");
        let latlong = utm.to_latlong().unwrap();
        assert!(latlong.is_geographic());
        let (lon, lat, _) = latlong.forward(15.0, 45.0, None).unwrap();
        assert_relative_eq!(lon, 15.0, epsilon = 1e-12);
        assert_relative_eq!(lat, 45.0, epsilon = 1e-12);
    }

    #[test]
    fn test_engineering_crs_is_rejected() {
        let local = Crs::from_string(
            r#"ENGCRS["Site grid",EDATUM["Site datum"],CS[Cartesian,2],AXIS["x",east],AXIS["y",north],LENGTHUNIT["metre",1]]"#,
        )
        .unwrap();
        assert!(matches!(
            Proj::new(&local),
            Err(ProjError::NotGeographic(_))
        ));
    }
}
