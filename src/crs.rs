use crate::context::ThreadContext;
use crate::datadir::DataDir;
use crate::ellipsoid::Ellipsoid;
use crate::error::ProjError;
use crate::geod::Geod;
use crate::parse::{self, CrsInput, ParsedCrs, ParserOptions};
use crate::pj::Pj;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

/// Broad classification of a CRS by its horizontal component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrsKind {
    Geographic,
    Projected,
    Geocentric,
    /// Vertical, engineering and other CRSs with no horizontal geodetic component.
    Other,
}

impl CrsKind {
    /// Bound CRSs are classified by their base CRS and compound CRSs by their first component.
    pub(crate) fn of(pj: &Pj) -> CrsKind {
        match pj.pj_type() {
            proj_sys::PJ_TYPE_PJ_TYPE_BOUND_CRS => {
                pj.source_crs().map_or(CrsKind::Other, |inner| CrsKind::of(&inner))
            }
            proj_sys::PJ_TYPE_PJ_TYPE_COMPOUND_CRS => {
                pj.sub_crs(0).map_or(CrsKind::Other, |inner| CrsKind::of(&inner))
            }
            proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_2D_CRS
            | proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_3D_CRS => CrsKind::Geographic,
            proj_sys::PJ_TYPE_PJ_TYPE_GEOCENTRIC_CRS => CrsKind::Geocentric,
            proj_sys::PJ_TYPE_PJ_TYPE_PROJECTED_CRS => CrsKind::Projected,
            _ => CrsKind::Other,
        }
    }
}

/// One axis of a coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub abbreviation: String,
    /// `north`, `east`, `up`, `geocentricX`...
    pub direction: String,
    pub unit_name: String,
    /// Factor converting the axis unit to metres or radians.
    pub unit_conversion_factor: f64,
}

/// Region where a CRS is valid, in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfUse {
    pub name: Option<String>,
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl AreaOfUse {
    /// `(west, south, east, north)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.west, self.south, self.east, self.north)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimeMeridian {
    pub name: String,
    /// Longitude east of Greenwich, in degrees.
    pub longitude: f64,
    /// Unit the meridian was defined in.
    pub unit_name: String,
}

/// Geodetic reference frame of a CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    pub name: String,
    pub ellipsoid: Option<Ellipsoid>,
    pub prime_meridian: Option<PrimeMeridian>,
    /// Helmert parameters towards WGS 84 carried by a bound CRS (`+towgs84=`).
    pub towgs84: Option<Vec<f64>>,
}

/// WKT dialects accepted by [`Crs::to_wkt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WktVersion {
    Wkt1Gdal,
    Wkt1Esri,
    Wkt2_2015,
    Wkt2_2015Simplified,
    #[default]
    Wkt2_2019,
    Wkt2_2019Simplified,
}

impl From<WktVersion> for proj_sys::PJ_WKT_TYPE {
    fn from(version: WktVersion) -> Self {
        match version {
            WktVersion::Wkt1Gdal => proj_sys::PJ_WKT_TYPE_PJ_WKT1_GDAL,
            WktVersion::Wkt1Esri => proj_sys::PJ_WKT_TYPE_PJ_WKT1_ESRI,
            WktVersion::Wkt2_2015 => proj_sys::PJ_WKT_TYPE_PJ_WKT2_2015,
            WktVersion::Wkt2_2015Simplified => proj_sys::PJ_WKT_TYPE_PJ_WKT2_2015_SIMPLIFIED,
            WktVersion::Wkt2_2019 => proj_sys::PJ_WKT_TYPE_PJ_WKT2_2019,
            WktVersion::Wkt2_2019Simplified => proj_sys::PJ_WKT_TYPE_PJ_WKT2_2019_SIMPLIFIED,
        }
    }
}

/// Result of [`Crs::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validity {
    pub is_valid: bool,
    /// Below `1.0` when the definition matched several database entries and one was picked.
    pub confidence: Option<f64>,
}

type Identification = (String, String, i32);

/// A coordinate reference system.
///
/// A `Crs` stores the canonical definition PROJ produced for the user input; derived
/// properties are read from PROJ on first access and cached. It holds no PROJ objects,
/// so it is `Send + Sync` and may be shared freely between threads.
///
/// Two `Crs` values are equal when their canonical definitions are equal, whatever form
/// they were created from.
///
/// # Examples
///
/// ```
/// use geoproj::Crs;
///
/// let wgs84 = Crs::from_epsg(4326).unwrap();
/// assert!(wgs84.is_geographic());
/// assert_eq!(wgs84.ellipsoid().unwrap().unwrap().semi_major(), 6378137.0);
/// assert_eq!(Crs::from_user_input("EPSG:4326").unwrap(), wgs84);
/// ```
#[derive(Clone)]
pub struct Crs {
    srs: String,
    parsed: ParsedCrs,
    data_dir: Arc<DataDir>,
    is_valid: OnceLock<bool>,
    datum: OnceLock<Result<Option<Datum>, ProjError>>,
    axis_info: OnceLock<Result<Vec<Axis>, ProjError>>,
    area_of_use: OnceLock<Result<Option<AreaOfUse>, ProjError>>,
    identifications: OnceLock<Result<Vec<Identification>, ProjError>>,
}

impl Crs {
    /// Builds a CRS from any supported description: WKT, PROJ string, PROJJSON,
    /// `AUTH:CODE`, an EPSG code, a parameter map or a CRS name.
    pub fn from_user_input(input: impl Into<CrsInput>) -> Result<Self, ProjError> {
        Crs::from_user_input_with(input, &ParserOptions::default(), DataDir::global())
    }

    /// Like [`from_user_input`](Self::from_user_input), with explicit parser options and
    /// data directory.
    pub fn from_user_input_with(
        input: impl Into<CrsInput>,
        options: &ParserOptions,
        data_dir: Arc<DataDir>,
    ) -> Result<Self, ProjError> {
        let input = input.into();
        let parsed = parse::parse(&input, &data_dir, options)?;
        Ok(Crs::from_parsed(input.to_string(), parsed, data_dir))
    }

    pub fn from_epsg(code: u32) -> Result<Self, ProjError> {
        Crs::from_user_input(code)
    }

    pub fn from_string(definition: &str) -> Result<Self, ProjError> {
        Crs::from_user_input(definition)
    }

    /// CRS from PROJ parameter names and values, e.g. `[("proj", "utm"), ("zone", "33")]`.
    ///
    /// A value of `true` emits a bare flag (`+south`) and `false` omits the parameter.
    pub fn from_dict<I, K, V>(params: I) -> Result<Self, ProjError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Crs::from_user_input(CrsInput::from_params(params))
    }

    fn from_parsed(srs: String, parsed: ParsedCrs, data_dir: Arc<DataDir>) -> Self {
        Crs {
            srs,
            parsed,
            data_dir,
            is_valid: OnceLock::new(),
            datum: OnceLock::new(),
            axis_info: OnceLock::new(),
            area_of_use: OnceLock::new(),
            identifications: OnceLock::new(),
        }
    }

    /// A CRS derived from this one through PROJ, sharing its data directory.
    fn derive<F>(&self, derive: F) -> Result<Crs, ProjError>
    where
        F: FnOnce(Pj) -> Result<Pj, ProjError>,
    {
        let parsed = self.with_pj(|pj| {
            let derived = derive(pj)?;
            ParsedCrs::from_pj(&derived, None)
        })?;
        Ok(Crs::from_parsed(
            parsed.definition.clone(),
            parsed,
            self.data_dir.clone(),
        ))
    }

    /// Runs `f` on a PROJ object rebuilt from the canonical definition in a fresh context.
    pub(crate) fn with_pj<T>(
        &self,
        f: impl FnOnce(Pj) -> Result<T, ProjError>,
    ) -> Result<T, ProjError> {
        let ctx = Rc::new(ThreadContext::new(&self.data_dir));
        f(Pj::from_definition(ctx, &self.parsed.definition)?)
    }

    /// Like [`with_pj`](Self::with_pj), but in the caller's context.
    pub(crate) fn to_pj(&self, ctx: &Rc<ThreadContext>) -> Result<Pj, ProjError> {
        Pj::from_definition(ctx.clone(), &self.parsed.definition)
    }

    /// The definition this CRS was created from, as the user gave it.
    pub fn srs(&self) -> &str {
        &self.srs
    }

    /// Canonical definition: WKT2:2019 whenever PROJ can express the CRS in it.
    pub fn definition(&self) -> &str {
        &self.parsed.definition
    }

    pub fn name(&self) -> &str {
        &self.parsed.name
    }

    pub fn kind(&self) -> CrsKind {
        self.parsed.kind
    }

    pub fn data_dir(&self) -> &Arc<DataDir> {
        &self.data_dir
    }

    pub fn is_geographic(&self) -> bool {
        self.parsed.kind == CrsKind::Geographic
    }

    pub fn is_projected(&self) -> bool {
        self.parsed.kind == CrsKind::Projected
    }

    pub fn is_geocentric(&self) -> bool {
        self.parsed.kind == CrsKind::Geocentric
    }

    /// Whether PROJ accepts the canonical definition as a CRS, with the confidence of the
    /// original resolution when the input was ambiguous.
    pub fn is_valid(&self) -> Validity {
        Validity {
            is_valid: *self
                .is_valid
                .get_or_init(|| self.with_pj(|pj| Ok(pj.is_crs())).unwrap_or(false)),
            confidence: self.parsed.confidence,
        }
    }

    /// Datum of the horizontal component; `None` for CRSs without a geodetic datum.
    pub fn datum(&self) -> Result<Option<&Datum>, ProjError> {
        self.datum
            .get_or_init(|| self.with_pj(read_datum))
            .as_ref()
            .map(Option::as_ref)
            .map_err(ProjError::clone)
    }

    pub fn ellipsoid(&self) -> Result<Option<&Ellipsoid>, ProjError> {
        Ok(self.datum()?.and_then(|datum| datum.ellipsoid.as_ref()))
    }

    pub fn prime_meridian(&self) -> Result<Option<&PrimeMeridian>, ProjError> {
        Ok(self.datum()?.and_then(|datum| datum.prime_meridian.as_ref()))
    }

    /// Axes in the order coordinates are given, across every component of a compound CRS.
    pub fn axis_info(&self) -> Result<&[Axis], ProjError> {
        self.axis_info
            .get_or_init(|| self.with_pj(|pj| Ok(read_axes(pj))))
            .as_deref()
            .map_err(ProjError::clone)
    }

    pub fn area_of_use(&self) -> Result<Option<&AreaOfUse>, ProjError> {
        self.area_of_use
            .get_or_init(|| {
                self.with_pj(|pj| {
                    Ok(pj
                        .area_of_use()
                        .or_else(|| pj.source_crs().and_then(|base| base.area_of_use())))
                })
            })
            .as_ref()
            .map(Option::as_ref)
            .map_err(ProjError::clone)
    }

    pub fn to_wkt(&self, version: WktVersion) -> Result<String, ProjError> {
        self.with_pj(|pj| pj.as_wkt(version.into(), false))
    }

    /// Multi-line, indented WKT.
    pub fn to_wkt_pretty(&self, version: WktVersion) -> Result<String, ProjError> {
        self.with_pj(|pj| pj.as_wkt(version.into(), true))
    }

    /// PROJ.4 style string; PROJ fails when the CRS cannot be expressed this way.
    pub fn to_proj_string(&self) -> Result<String, ProjError> {
        self.with_pj(|pj| pj.as_proj_string())
    }

    /// PROJJSON.
    pub fn to_json(&self) -> Result<String, ProjError> {
        self.with_pj(|pj| pj.as_projjson(false))
    }

    pub fn to_json_pretty(&self) -> Result<String, ProjError> {
        self.with_pj(|pj| pj.as_projjson(true))
    }

    /// The EPSG code matching this CRS with at least `min_confidence` percent confidence.
    ///
    /// ```
    /// use geoproj::Crs;
    ///
    /// let crs = Crs::from_user_input("+proj=longlat +datum=WGS84 +no_defs").unwrap();
    /// assert_eq!(crs.to_epsg(70).unwrap(), 4326);
    /// ```
    pub fn to_epsg(&self, min_confidence: i32) -> Result<u32, ProjError> {
        let (_, code) = self.to_authority(Some("EPSG"), min_confidence)?;
        code.parse()
            .map_err(|_| ProjError::NoEpsgMapping(self.name().to_string()))
    }

    /// The best `(authority, code)` match, optionally restricted to one authority.
    pub fn to_authority(
        &self,
        authority: Option<&str>,
        min_confidence: i32,
    ) -> Result<(String, String), ProjError> {
        self.identifications()?
            .iter()
            .find(|(auth, _, confidence)| {
                *confidence >= min_confidence
                    && authority.is_none_or(|wanted| wanted.eq_ignore_ascii_case(auth))
            })
            .map(|(auth, code, _)| (auth.clone(), code.clone()))
            .ok_or_else(|| ProjError::NoEpsgMapping(self.name().to_string()))
    }

    /// Database matches for this CRS, best first; an identifier carried by the CRS itself
    /// counts as a 100% match.
    fn identifications(&self) -> Result<&[Identification], ProjError> {
        self.identifications
            .get_or_init(|| {
                self.with_pj(|pj| {
                    let mut matches: Vec<Identification> = pj
                        .id()
                        .map(|(authority, code)| (authority, code, 100))
                        .into_iter()
                        .collect();
                    if pj.context().database_path().is_some() {
                        matches.extend(pj.identify(None)?.into_iter().filter_map(
                            |(candidate, confidence)| {
                                candidate
                                    .id()
                                    .map(|(authority, code)| (authority, code, confidence))
                            },
                        ));
                    } else if matches.is_empty() {
                        return Err(ProjError::DataDirNotFound {
                            searched: self.data_dir.searched(),
                        });
                    }
                    // stable, so the CRS's own identifier stays ahead of equal matches
                    matches.sort_by_key(|(_, _, confidence)| -confidence);
                    Ok(matches)
                })
            })
            .as_deref()
            .map_err(ProjError::clone)
    }

    /// A [`Geod`] on this CRS's ellipsoid.
    pub fn get_geod(&self) -> Result<Geod, ProjError> {
        match self.ellipsoid()? {
            Some(ellipsoid) => Ok(Geod::from_ellipsoid(ellipsoid.clone())),
            None => Err(ProjError::NotGeographic(self.name().to_string())),
        }
    }

    /// The geodetic CRS (geographic or geocentric) this CRS is based on.
    pub fn to_geodetic(&self) -> Result<Crs, ProjError> {
        let name = self.name().to_string();
        self.derive(|pj| {
            pj.into_horizontal()
                .geodetic_crs()
                .ok_or(ProjError::NotGeographic(name))
        })
    }

    /// Longitude/latitude CRS in degrees on the same datum.
    pub fn geographic_crs(&self) -> Result<Crs, ProjError> {
        let name = self.name().to_string();
        self.derive(|pj| {
            let horizontal = pj.into_horizontal();
            let geodetic = horizontal.geodetic_crs();
            let geodetic = geodetic.as_ref().unwrap_or(&horizontal);
            let crs_name = geodetic.name().unwrap_or_else(|| name.clone());
            geodetic
                .datum()
                .and_then(|datum| datum.geographic_crs_from_datum(&crs_name, false))
                .ok_or(ProjError::NotGeographic(name))
        })
    }

    /// PROJ's equivalence test, which ignores metadata such as names and identifiers.
    pub fn is_equivalent_to(&self, other: &Crs) -> Result<bool, ProjError> {
        let ctx = Rc::new(ThreadContext::new(&self.data_dir));
        let this = self.to_pj(&ctx)?;
        let that = other.to_pj(&ctx)?;
        Ok(this.is_equivalent_to(&that))
    }
}

fn read_datum(pj: Pj) -> Result<Option<Datum>, ProjError> {
    let towgs84 = if pj.pj_type() == proj_sys::PJ_TYPE_PJ_TYPE_BOUND_CRS {
        pj.coordinate_operation().and_then(|op| op.towgs84())
    } else {
        None
    };
    let horizontal = pj.into_horizontal();
    let geodetic = horizontal.geodetic_crs();
    let Some(datum) = geodetic.as_ref().unwrap_or(&horizontal).datum() else {
        return Ok(None);
    };
    let ellipsoid = match datum.ellipsoid() {
        Some(ellipsoid) => ellipsoid.ellipsoid_parameters()?,
        None => None,
    };
    Ok(Some(Datum {
        name: datum.name().unwrap_or_default(),
        ellipsoid,
        prime_meridian: datum
            .prime_meridian()
            .and_then(|meridian| meridian.prime_meridian_parameters()),
        towgs84,
    }))
}

fn read_axes(pj: Pj) -> Vec<Axis> {
    match pj.pj_type() {
        proj_sys::PJ_TYPE_PJ_TYPE_BOUND_CRS => pj.source_crs().map(read_axes).unwrap_or_default(),
        proj_sys::PJ_TYPE_PJ_TYPE_COMPOUND_CRS => {
            (0..).map_while(|index| pj.sub_crs(index)).flat_map(read_axes).collect()
        }
        _ => pj
            .coordinate_system()
            .map(|cs| cs.axes())
            .unwrap_or_default(),
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.parsed.definition == other.parsed.definition
    }
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crs")
            .field("srs", &self.srs)
            .field("name", &self.parsed.name)
            .field("kind", &self.parsed.kind)
            .finish()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.srs)
    }
}

impl TryFrom<&str> for Crs {
    type Error = ProjError;

    fn try_from(definition: &str) -> Result<Self, Self::Error> {
        Crs::from_user_input(definition)
    }
}

impl TryFrom<u32> for Crs {
    type Error = ProjError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Crs::from_epsg(code)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    const NAD27_WKT: &str = r#"GEOGCS["NAD27",DATUM["North_American_Datum_1927",SPHEROID["Clarke 1866",6378206.4,294.978698213898,AUTHORITY["EPSG","7008"]],AUTHORITY["EPSG","6267"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4267"]]"#;

    const UTM_WKT: &str = r#"PROJCS["WGS 84 / UTM zone 33N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",15],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1]]"#;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_crs_is_send_sync() {
        assert_send_sync::<Crs>();
    }

    #[test]
    fn test_epsg_4326() {
        let crs = Crs::from_epsg(4326).unwrap();
        assert!(crs.is_geographic());
        assert!(!crs.is_projected());
        assert_eq!(crs.name(), "WGS 84");
        let ellipsoid = crs.ellipsoid().unwrap().unwrap();
        assert_eq!(ellipsoid.semi_major(), 6378137.0);
        assert_relative_eq!(ellipsoid.inverse_flattening(), 298.257223563, epsilon = 1e-9);
        let axes = crs.axis_info().unwrap();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0].direction, "north");
        assert_eq!(axes[1].direction, "east");
        let area = crs.area_of_use().unwrap().unwrap();
        assert_eq!(area.bounds(), (-180.0, -90.0, 180.0, 90.0));
        assert_eq!(crs.to_epsg(100).unwrap(), 4326);
        assert_eq!(
            crs.is_valid(),
            Validity {
                is_valid: true,
                confidence: None
            }
        );
    }

    #[test]
    fn test_wkt1_inputs() {
        let nad27 = Crs::from_string(NAD27_WKT).unwrap();
        assert!(nad27.is_geographic());
        let datum = nad27.datum().unwrap().unwrap();
        assert!(datum.name.contains("1927"));
        assert_relative_eq!(
            datum.ellipsoid.as_ref().unwrap().semi_major(),
            6378206.4,
            epsilon = 1e-6
        );
        assert_eq!(datum.prime_meridian.as_ref().unwrap().longitude, 0.0);

        let utm = Crs::from_string(UTM_WKT).unwrap();
        assert!(utm.is_projected());
        assert_eq!(utm.ellipsoid().unwrap().unwrap().semi_major(), 6378137.0);
        assert_eq!(utm.axis_info().unwrap()[0].abbreviation, "E");
    }

    #[test]
    fn test_malformed_wkt() {
        let err = Crs::from_string("GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\"").unwrap_err();
        assert!(matches!(err, ProjError::InvalidDefinition(_)));
    }

    #[test]
    fn test_unknown_code() {
        let err = Crs::from_epsg(123456).unwrap_err();
        assert!(matches!(err, ProjError::UnknownAuthorityCode { .. }));
    }

    #[test]
    fn test_codes_need_the_database_but_text_does_not() {
        let dir = std::env::temp_dir().join(format!("geoproj-no-db-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let data_dir = Arc::new(DataDir::new());
        data_dir.set(&dir);
        let options = ParserOptions::default();

        let err = Crs::from_user_input_with(4326, &options, data_dir.clone()).unwrap_err();
        assert!(
            matches!(&err, ProjError::DataDirNotFound { searched } if searched.first() == Some(&dir)),
            "{err:?}"
        );

        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;
        let from_wkt = Crs::from_user_input_with(wkt, &options, data_dir.clone()).unwrap();
        assert!(from_wkt.is_geographic());
        assert!(Arc::ptr_eq(from_wkt.data_dir(), &data_dir));
        let from_proj =
            Crs::from_user_input_with("+proj=longlat +ellps=WGS84", &options, data_dir.clone())
                .unwrap();
        assert!(from_proj.is_geographic());
        assert_eq!(from_proj.ellipsoid().unwrap().unwrap().semi_major(), 6378137.0);

        data_dir.reset();
        let crs = Crs::from_user_input_with(4326, &options, data_dir).unwrap();
        assert_eq!(crs.name(), "WGS 84");
    }

    #[test]
    fn test_is_valid_is_cached() {
        let crs = Crs::from_user_input("+proj=merc +ellps=WGS84").unwrap();
        let first = crs.is_valid();
        assert!(first.is_valid);
        assert_eq!(crs.is_valid.get(), Some(&true));
        assert_eq!(crs.clone().is_valid(), first);
    }

    #[test]
    fn test_value_equality() {
        let from_code = Crs::from_epsg(32633).unwrap();
        let from_text = Crs::from_user_input("epsg:32633").unwrap();
        assert_eq!(from_code, from_text);
        assert_eq!(from_text.to_string(), "EPSG:32633");
        assert_ne!(from_code, Crs::from_epsg(32634).unwrap());
    }

    #[test]
    fn test_proj_string_and_dict() {
        let crs = Crs::from_string("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs").unwrap();
        assert!(crs.is_projected());
        assert_eq!(crs.to_epsg(70).unwrap(), 32633);
        let from_dict = Crs::from_dict([
            ("proj", "utm"),
            ("zone", "33"),
            ("datum", "WGS84"),
            ("units", "m"),
            ("no_defs", "true"),
        ])
        .unwrap();
        assert!(crs.is_equivalent_to(&from_dict).unwrap());
        assert!(
            crs.to_proj_string()
                .unwrap()
                .contains("+proj=utm +zone=33")
        );
    }

    #[test]
    fn test_towgs84() {
        let crs = Crs::from_string(
            "+proj=longlat +ellps=intl +towgs84=-87,-98,-121,0,0,0,0 +no_defs",
        )
        .unwrap();
        assert!(crs.is_geographic());
        let datum = crs.datum().unwrap().unwrap();
        assert_eq!(
            datum.towgs84.as_deref(),
            Some(&[-87.0, -98.0, -121.0, 0.0, 0.0, 0.0, 0.0][..])
        );
        assert_eq!(
            datum.ellipsoid.as_ref().unwrap().semi_major(),
            6378388.0
        );
    }

    #[test]
    fn test_geocentric_and_compound() {
        let ecef = Crs::from_epsg(4978).unwrap();
        assert!(ecef.is_geocentric());
        assert_eq!(ecef.axis_info().unwrap().len(), 3);

        // WGS 84 + EGM96 height
        let compound = Crs::from_user_input("EPSG:4326+5773").unwrap();
        assert!(compound.is_geographic());
        let axes = compound.axis_info().unwrap();
        assert_eq!(axes.len(), 3);
        assert_eq!(axes[2].direction, "up");
    }

    #[test]
    fn test_get_geod() {
        let geod = Crs::from_epsg(4267).unwrap().get_geod().unwrap();
        assert_eq!(geod.ellipsoid().semi_major(), 6378206.4);
        let (_, _, dist) = geod.inverse(0.0, 0.0, 0.0, 1.0).unwrap();
        assert!(dist > 111_000.0 && dist < 111_400.0);
    }

    #[test]
    fn test_engineering_crs_has_no_geod() {
        let local = Crs::from_string(
            r#"ENGCRS["Site grid",EDATUM["Site datum"],CS[Cartesian,2],AXIS["x",east],AXIS["y",north],LENGTHUNIT["metre",1]]"#,
        )
        .unwrap();
        assert_eq!(local.kind(), CrsKind::Other);
        assert!(local.ellipsoid().unwrap().is_none());
        assert!(matches!(
            local.get_geod(),
            Err(ProjError::NotGeographic(_))
        ));
        assert!(matches!(local.to_epsg(70), Err(ProjError::NoEpsgMapping(_))));
    }

    #[test]
    fn test_derived_crs() {
        let utm = Crs::from_epsg(32633).unwrap();
        let geodetic = utm.to_geodetic().unwrap();
        assert!(geodetic.is_geographic());
        assert_eq!(geodetic.to_epsg(100).unwrap(), 4326);

        let lonlat = utm.geographic_crs().unwrap();
        assert!(lonlat.is_geographic());
        assert_eq!(lonlat.axis_info().unwrap()[0].direction, "east");
    }

    #[test]
    fn test_serialisation() {
        let crs = Crs::from_epsg(4326).unwrap();
        assert!(crs.to_wkt(WktVersion::Wkt1Gdal).unwrap().starts_with("GEOGCS["));
        assert!(crs.to_wkt(WktVersion::Wkt2_2019).unwrap().starts_with("GEOGCRS["));
        assert!(crs.to_wkt_pretty(WktVersion::Wkt2_2015).unwrap().contains('\n'));
        assert!(crs.to_json().unwrap().contains("\"GeographicCRS\""));
        let reparsed = Crs::from_string(&crs.to_json().unwrap()).unwrap();
        assert!(reparsed.is_equivalent_to(&crs).unwrap());
    }

    #[test]
    fn test_cached_properties_are_shared_across_threads() {
        let crs = Arc::new(Crs::from_epsg(3857).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let crs = crs.clone();
                std::thread::spawn(move || crs.ellipsoid().unwrap().unwrap().semi_major())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 6378137.0);
        }
    }
}
