use crate::context::ThreadContext;
use crate::crs::{AreaOfUse, Axis, PrimeMeridian};
use crate::cstring_array::OptionList;
use crate::datadir::DataDir;
use crate::ellipsoid::Ellipsoid;
use crate::errno::Errno;
use crate::error::ProjError;
use libc::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::{ptr, rc::Rc, str};

pub(crate) unsafe fn _string(raw_ptr: *const c_char) -> Result<String, str::Utf8Error> {
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    Ok(str::from_utf8(c_str.to_bytes())?.to_string())
}

/// Lossy copy of a PROJ-owned string; `None` for a null pointer.
pub(crate) unsafe fn _opt_string(raw_ptr: *const c_char) -> Option<String> {
    if raw_ptr.is_null() {
        return None;
    }
    let c_str = unsafe { CStr::from_ptr(raw_ptr) };
    Some(c_str.to_string_lossy().into_owned())
}

/// Copies and frees a `PROJ_STRING_LIST` returned through an out parameter.
unsafe fn take_string_list(list: proj_sys::PROJ_STRING_LIST) -> Vec<String> {
    if list.is_null() {
        return Vec::new();
    }
    let mut strings = Vec::new();
    let mut cursor = list;
    unsafe {
        while !(*cursor).is_null() {
            if let Some(s) = _opt_string(*cursor) {
                strings.push(s);
            }
            cursor = cursor.add(1);
        }
        proj_sys::proj_string_list_destroy(list);
    }
    strings
}

const CRS_TYPES: [proj_sys::PJ_TYPE; 6] = [
    proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_2D_CRS,
    proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_3D_CRS,
    proj_sys::PJ_TYPE_PJ_TYPE_GEOCENTRIC_CRS,
    proj_sys::PJ_TYPE_PJ_TYPE_PROJECTED_CRS,
    proj_sys::PJ_TYPE_PJ_TYPE_VERTICAL_CRS,
    proj_sys::PJ_TYPE_PJ_TYPE_COMPOUND_CRS,
];

/// Direction of a coordinate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Inverse,
}

impl From<Direction> for proj_sys::PJ_DIRECTION {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => proj_sys::PJ_DIRECTION_PJ_FWD,
            Direction::Inverse => proj_sys::PJ_DIRECTION_PJ_INV,
        }
    }
}

/// A safe wrapper around `proj_sys::PJ`.
///
/// Every object keeps the thread context it was created in alive; objects derived from it
/// (datum, ellipsoid, sub CRSs...) share that context.
pub(crate) struct Pj {
    pj: ptr::NonNull<proj_sys::PJ>,
    ctx: Rc<ThreadContext>,
}

impl Pj {
    /// Anything `proj_create` understands: PROJ strings, WKT, PROJJSON, `AUTH:CODE`, URNs
    /// and object names.
    pub fn from_definition(ctx: Rc<ThreadContext>, definition: &str) -> Result<Self, ProjError> {
        let c_definition = CString::new(definition)?;
        let pj_ptr = unsafe { proj_sys::proj_create(ctx.as_ptr(), c_definition.as_ptr()) };
        Pj::from_pj_ptr(ctx, pj_ptr, ProjError::InvalidDefinition)
    }

    /// Parses WKT, reporting the grammar errors PROJ collected when it fails.
    pub fn from_wkt(ctx: Rc<ThreadContext>, wkt: &str) -> Result<Self, ProjError> {
        let c_wkt = CString::new(wkt)?;
        let options = OptionList::new().with("STRICT", "NO")?;
        let mut warnings: proj_sys::PROJ_STRING_LIST = ptr::null_mut();
        let mut grammar_errors: proj_sys::PROJ_STRING_LIST = ptr::null_mut();
        let pj_ptr = unsafe {
            proj_sys::proj_create_from_wkt(
                ctx.as_ptr(),
                c_wkt.as_ptr(),
                options.as_ptr(),
                &mut warnings,
                &mut grammar_errors,
            )
        };
        for warning in unsafe { take_string_list(warnings) } {
            log::debug!("WKT warning: {warning}");
        }
        let grammar_errors = unsafe { take_string_list(grammar_errors) };
        Pj::from_pj_ptr(ctx, pj_ptr, |message| {
            if grammar_errors.is_empty() {
                ProjError::InvalidDefinition(message)
            } else {
                ProjError::InvalidDefinition(grammar_errors.join("; "))
            }
        })
    }

    /// Looks a CRS up in the authority database.
    pub fn from_database(
        ctx: Rc<ThreadContext>,
        authority: &str,
        code: &str,
    ) -> Result<Self, ProjError> {
        let c_authority = CString::new(authority)?;
        let c_code = CString::new(code)?;
        let pj_ptr = unsafe {
            proj_sys::proj_create_from_database(
                ctx.as_ptr(),
                c_authority.as_ptr(),
                c_code.as_ptr(),
                proj_sys::PJ_CATEGORY_PJ_CATEGORY_CRS,
                0,
                ptr::null(),
            )
        };
        Pj::from_pj_ptr(ctx, pj_ptr, |_| ProjError::UnknownAuthorityCode {
            authority: authority.to_string(),
            code: code.to_string(),
        })
    }

    /// Every CRS of the authority database whose name matches `name` exactly, in database order.
    pub fn search_crs_by_name(ctx: &Rc<ThreadContext>, name: &str) -> Result<Vec<Pj>, ProjError> {
        let c_name = CString::new(name)?;
        let list = unsafe {
            proj_sys::proj_create_from_name(
                ctx.as_ptr(),
                ptr::null(),
                c_name.as_ptr(),
                CRS_TYPES.as_ptr(),
                CRS_TYPES.len(),
                0,
                0,
                ptr::null(),
            )
        };
        Ok(unsafe { take_object_list(ctx, list) })
    }

    /// The operation PROJ considers best to go from `source` to `target`.
    ///
    /// Both objects must come from the same thread context.
    pub fn crs_to_crs(source: &Pj, target: &Pj) -> Result<Self, ProjError> {
        debug_assert!(Rc::ptr_eq(&source.ctx, &target.ctx));
        let pj_ptr = unsafe {
            proj_sys::proj_create_crs_to_crs_from_pj(
                source.ctx.as_ptr(),
                source.as_ptr(),
                target.as_ptr(),
                ptr::null_mut(),
                ptr::null(),
            )
        };
        Pj::from_pj_ptr(source.ctx.clone(), pj_ptr, |reason| ProjError::NoOperationFound {
            source_crs: source.name().unwrap_or_default(),
            target_crs: target.name().unwrap_or_default(),
            reason,
        })
    }

    /// Same operation with longitude first and easting first on both ends.
    pub fn normalize_for_visualization(&self) -> Result<Self, ProjError> {
        let pj_ptr = unsafe {
            proj_sys::proj_normalize_for_visualization(self.ctx.as_ptr(), self.as_ptr())
        };
        Pj::from_pj_ptr(self.ctx.clone(), pj_ptr, |reason| {
            ProjError::NoOperationFound {
                source_crs: String::new(),
                target_crs: String::new(),
                reason,
            }
        })
    }

    fn from_pj_ptr(
        ctx: Rc<ThreadContext>,
        pj_ptr: *mut proj_sys::PJ,
        on_null: impl FnOnce(String) -> ProjError,
    ) -> Result<Self, ProjError> {
        match ptr::NonNull::new(pj_ptr) {
            Some(pj) => Ok(Pj { pj, ctx }),
            None => Err(on_null(ctx.last_error())),
        }
    }

    /// Wraps an object derived from this one; `None` when PROJ returned null.
    fn derived(&self, pj_ptr: *mut proj_sys::PJ) -> Option<Pj> {
        ptr::NonNull::new(pj_ptr).map(|pj| Pj {
            pj,
            ctx: self.ctx.clone(),
        })
    }

    pub fn as_ptr(&self) -> *mut proj_sys::PJ {
        self.pj.as_ptr()
    }

    pub fn context(&self) -> &Rc<ThreadContext> {
        &self.ctx
    }

    pub fn last_error(&self) -> String {
        self.ctx.last_error()
    }

    pub fn is_crs(&self) -> bool {
        unsafe { proj_sys::proj_is_crs(self.as_ptr()) != 0 }
    }

    pub fn pj_type(&self) -> proj_sys::PJ_TYPE {
        unsafe { proj_sys::proj_get_type(self.as_ptr()) }
    }

    pub fn name(&self) -> Option<String> {
        unsafe { _opt_string(proj_sys::proj_get_name(self.as_ptr())) }
    }

    /// The first `(authority, code)` identifier attached to the object.
    pub fn id(&self) -> Option<(String, String)> {
        let authority = unsafe { _opt_string(proj_sys::proj_get_id_auth_name(self.as_ptr(), 0)) };
        let code = unsafe { _opt_string(proj_sys::proj_get_id_code(self.as_ptr(), 0)) };
        authority.zip(code)
    }

    pub fn as_wkt(
        &self,
        wkt_type: proj_sys::PJ_WKT_TYPE,
        multiline: bool,
    ) -> Result<String, ProjError> {
        let options = OptionList::new().with("MULTILINE", if multiline { "YES" } else { "NO" })?;
        let raw = unsafe {
            proj_sys::proj_as_wkt(self.ctx.as_ptr(), self.as_ptr(), wkt_type, options.as_ptr())
        };
        self.exported(raw)
    }

    pub fn as_proj_string(&self) -> Result<String, ProjError> {
        let raw = unsafe {
            proj_sys::proj_as_proj_string(
                self.ctx.as_ptr(),
                self.as_ptr(),
                proj_sys::PJ_PROJ_STRING_TYPE_PJ_PROJ_4,
                ptr::null(),
            )
        };
        self.exported(raw)
    }

    pub fn as_projjson(&self, multiline: bool) -> Result<String, ProjError> {
        let options = OptionList::new().with("MULTILINE", if multiline { "YES" } else { "NO" })?;
        let raw = unsafe {
            proj_sys::proj_as_projjson(self.ctx.as_ptr(), self.as_ptr(), options.as_ptr())
        };
        self.exported(raw)
    }

    fn exported(&self, raw: *const c_char) -> Result<String, ProjError> {
        if raw.is_null() {
            return Err(ProjError::Export(self.last_error()));
        }
        Ok(unsafe { _string(raw) }?)
    }

    /// The base CRS of a bound CRS.
    pub fn source_crs(&self) -> Option<Pj> {
        self.derived(unsafe { proj_sys::proj_get_source_crs(self.ctx.as_ptr(), self.as_ptr()) })
    }

    pub fn sub_crs(&self, index: usize) -> Option<Pj> {
        let index = c_int::try_from(index).ok()?;
        self.derived(unsafe {
            proj_sys::proj_crs_get_sub_crs(self.ctx.as_ptr(), self.as_ptr(), index)
        })
    }

    /// Strips bound and compound wrappers down to the horizontal single CRS.
    pub fn into_horizontal(self) -> Pj {
        let mut pj = self;
        loop {
            let inner = match pj.pj_type() {
                proj_sys::PJ_TYPE_PJ_TYPE_BOUND_CRS => pj.source_crs(),
                proj_sys::PJ_TYPE_PJ_TYPE_COMPOUND_CRS => pj.sub_crs(0),
                _ => None,
            };
            match inner {
                Some(inner) => pj = inner,
                None => return pj,
            }
        }
    }

    pub fn geodetic_crs(&self) -> Option<Pj> {
        self.derived(unsafe {
            proj_sys::proj_crs_get_geodetic_crs(self.ctx.as_ptr(), self.as_ptr())
        })
    }

    /// The datum of a single CRS; datum ensembles are collapsed to a representative datum.
    pub fn datum(&self) -> Option<Pj> {
        self.derived(unsafe {
            proj_sys::proj_crs_get_datum_forced(self.ctx.as_ptr(), self.as_ptr())
        })
    }

    pub fn ellipsoid(&self) -> Option<Pj> {
        self.derived(unsafe { proj_sys::proj_get_ellipsoid(self.ctx.as_ptr(), self.as_ptr()) })
    }

    pub fn prime_meridian(&self) -> Option<Pj> {
        self.derived(unsafe {
            proj_sys::proj_get_prime_meridian(self.ctx.as_ptr(), self.as_ptr())
        })
    }

    pub fn coordinate_system(&self) -> Option<Pj> {
        self.derived(unsafe {
            proj_sys::proj_crs_get_coordinate_system(self.ctx.as_ptr(), self.as_ptr())
        })
    }

    /// The operation of a bound CRS towards its hub CRS.
    pub fn coordinate_operation(&self) -> Option<Pj> {
        self.derived(unsafe {
            proj_sys::proj_crs_get_coordoperation(self.ctx.as_ptr(), self.as_ptr())
        })
    }

    /// Shape of an ellipsoid object.
    pub fn ellipsoid_parameters(&self) -> Result<Option<Ellipsoid>, ProjError> {
        let mut semi_major = 0.0;
        let mut semi_minor = 0.0;
        let mut is_semi_minor_computed: c_int = 0;
        let mut inverse_flattening = 0.0;
        let ok = unsafe {
            proj_sys::proj_ellipsoid_get_parameters(
                self.ctx.as_ptr(),
                self.as_ptr(),
                &mut semi_major,
                &mut semi_minor,
                &mut is_semi_minor_computed,
                &mut inverse_flattening,
            )
        };
        if ok == 0 {
            return Ok(None);
        }
        Ellipsoid::from_parameters(
            self.name().unwrap_or_default(),
            semi_major,
            semi_minor,
            inverse_flattening,
            is_semi_minor_computed != 0,
        )
        .map(Some)
    }

    pub fn prime_meridian_parameters(&self) -> Option<PrimeMeridian> {
        let mut longitude = 0.0;
        let mut unit_conv_factor = 0.0;
        let mut unit_name: *const c_char = ptr::null();
        let ok = unsafe {
            proj_sys::proj_prime_meridian_get_parameters(
                self.ctx.as_ptr(),
                self.as_ptr(),
                &mut longitude,
                &mut unit_conv_factor,
                &mut unit_name,
            )
        };
        if ok == 0 {
            return None;
        }
        Some(PrimeMeridian {
            name: self.name().unwrap_or_default(),
            longitude: (longitude * unit_conv_factor).to_degrees(),
            unit_name: unsafe { _opt_string(unit_name) }.unwrap_or_default(),
        })
    }

    /// Axes of a coordinate system object.
    pub fn axes(&self) -> Vec<Axis> {
        let count = unsafe { proj_sys::proj_cs_get_axis_count(self.ctx.as_ptr(), self.as_ptr()) };
        (0..count.max(0)).filter_map(|index| self.axis(index)).collect()
    }

    fn axis(&self, index: c_int) -> Option<Axis> {
        let mut name: *const c_char = ptr::null();
        let mut abbreviation: *const c_char = ptr::null();
        let mut direction: *const c_char = ptr::null();
        let mut unit_conversion_factor = 0.0;
        let mut unit_name: *const c_char = ptr::null();
        let mut unit_auth_name: *const c_char = ptr::null();
        let mut unit_code: *const c_char = ptr::null();
        let ok = unsafe {
            proj_sys::proj_cs_get_axis_info(
                self.ctx.as_ptr(),
                self.as_ptr(),
                index,
                &mut name,
                &mut abbreviation,
                &mut direction,
                &mut unit_conversion_factor,
                &mut unit_name,
                &mut unit_auth_name,
                &mut unit_code,
            )
        };
        if ok == 0 {
            return None;
        }
        unsafe {
            Some(Axis {
                name: _opt_string(name).unwrap_or_default(),
                abbreviation: _opt_string(abbreviation).unwrap_or_default(),
                direction: _opt_string(direction).unwrap_or_default(),
                unit_name: _opt_string(unit_name).unwrap_or_default(),
                unit_conversion_factor,
            })
        }
    }

    pub fn area_of_use(&self) -> Option<AreaOfUse> {
        let mut west = 0.0;
        let mut south = 0.0;
        let mut east = 0.0;
        let mut north = 0.0;
        let mut name: *const c_char = ptr::null();
        let ok = unsafe {
            proj_sys::proj_get_area_of_use(
                self.ctx.as_ptr(),
                self.as_ptr(),
                &mut west,
                &mut south,
                &mut east,
                &mut north,
                &mut name,
            )
        };
        // PROJ reports unknown bounds as -1000
        if ok == 0 || west == -1000.0 {
            return None;
        }
        Some(AreaOfUse {
            name: unsafe { _opt_string(name) },
            west,
            south,
            east,
            north,
        })
    }

    /// The seven Helmert parameters of a bound CRS operation, when it can be expressed as one.
    pub fn towgs84(&self) -> Option<Vec<f64>> {
        let mut values = [0.0; 7];
        let ok = unsafe {
            proj_sys::proj_coordoperation_get_towgs84_values(
                self.ctx.as_ptr(),
                self.as_ptr(),
                values.as_mut_ptr(),
                values.len() as c_int,
                0,
            )
        };
        (ok != 0).then(|| values.to_vec())
    }

    /// Database objects matching this one, with PROJ's confidence in percent.
    pub fn identify(&self, authority: Option<&str>) -> Result<Vec<(Pj, i32)>, ProjError> {
        let c_authority = authority.map(CString::new).transpose()?;
        let mut confidence: *mut c_int = ptr::null_mut();
        let list = unsafe {
            proj_sys::proj_identify(
                self.ctx.as_ptr(),
                self.as_ptr(),
                c_authority.as_ref().map_or(ptr::null(), |auth| auth.as_ptr()),
                ptr::null(),
                &mut confidence,
            )
        };
        let candidates = unsafe { take_object_list(&self.ctx, list) };
        let scored = candidates
            .into_iter()
            .enumerate()
            .map(|(index, pj)| {
                let score = if confidence.is_null() {
                    0
                } else {
                    unsafe { *confidence.add(index) }
                };
                (pj, score)
            })
            .collect();
        if !confidence.is_null() {
            unsafe { proj_sys::proj_int_list_destroy(confidence) };
        }
        Ok(scored)
    }

    pub fn is_equivalent_to(&self, other: &Pj) -> bool {
        unsafe {
            proj_sys::proj_is_equivalent_to_with_ctx(
                self.ctx.as_ptr(),
                self.as_ptr(),
                other.as_ptr(),
                proj_sys::PJ_COMPARISON_CRITERION_PJ_COMP_EQUIVALENT,
            ) != 0
        }
    }

    /// A longitude/latitude geographic CRS in degrees on this datum.
    pub fn geographic_crs_from_datum(&self, name: &str, with_height: bool) -> Option<Pj> {
        let cs = if with_height {
            unsafe {
                proj_sys::proj_create_ellipsoidal_3D_cs(
                    self.ctx.as_ptr(),
                    proj_sys::PJ_ELLIPSOIDAL_CS_3D_TYPE_PJ_ELLPS3D_LONGITUDE_LATITUDE_HEIGHT,
                    ptr::null(),
                    0.0,
                    ptr::null(),
                    0.0,
                )
            }
        } else {
            unsafe {
                proj_sys::proj_create_ellipsoidal_2D_cs(
                    self.ctx.as_ptr(),
                    proj_sys::PJ_ELLIPSOIDAL_CS_2D_TYPE_PJ_ELLPS2D_LONGITUDE_LATITUDE,
                    ptr::null(),
                    0.0,
                )
            }
        };
        let cs = self.derived(cs)?;
        let c_name = CString::new(name).ok()?;
        self.derived(unsafe {
            proj_sys::proj_create_geographic_crs_from_datum(
                self.ctx.as_ptr(),
                c_name.as_ptr(),
                self.as_ptr(),
                cs.as_ptr(),
            )
        })
    }

    /// Operation definition and invertibility, as reported by `proj_pj_info`.
    pub fn info(&self) -> (Option<String>, bool) {
        let info = unsafe { proj_sys::proj_pj_info(self.as_ptr()) };
        (unsafe { _opt_string(info.definition) }, info.has_inverse != 0)
    }

    /// Whether the operation expects (or produces) radians in `direction`.
    pub fn angular_input(&self, direction: Direction) -> bool {
        unsafe { proj_sys::proj_angular_input(self.as_ptr(), direction.into()) != 0 }
    }

    pub fn angular_output(&self, direction: Direction) -> bool {
        unsafe { proj_sys::proj_angular_output(self.as_ptr(), direction.into()) != 0 }
    }

    pub fn errno(&self) -> Errno {
        Errno(unsafe { proj_sys::proj_errno(self.as_ptr()) })
    }

    pub fn errno_reset(&self) -> Errno {
        Errno(unsafe { proj_sys::proj_errno_reset(self.as_ptr()) })
    }

    pub fn trans(
        &self,
        direction: proj_sys::PJ_DIRECTION,
        coord: proj_sys::PJ_COORD,
    ) -> proj_sys::PJ_COORD {
        unsafe { proj_sys::proj_trans(self.as_ptr(), direction, coord) }
    }
}

impl Drop for Pj {
    fn drop(&mut self) {
        unsafe {
            proj_sys::proj_destroy(self.as_ptr());
        }
    }
}

/// Unpacks and frees a `PJ_OBJ_LIST`.
unsafe fn take_object_list(
    ctx: &Rc<ThreadContext>,
    list: *mut proj_sys::PJ_OBJ_LIST,
) -> Vec<Pj> {
    if list.is_null() {
        return Vec::new();
    }
    let count = unsafe { proj_sys::proj_list_get_count(list) };
    let objects = (0..count)
        .filter_map(|index| {
            let pj_ptr = unsafe { proj_sys::proj_list_get(ctx.as_ptr(), list, index) };
            ptr::NonNull::new(pj_ptr).map(|pj| Pj {
                pj,
                ctx: ctx.clone(),
            })
        })
        .collect();
    unsafe { proj_sys::proj_list_destroy(list) };
    objects
}

/// A PROJ coordinate operation that owns its thread context outright.
///
/// `Pj` is neither `Send` nor `Sync` because PROJ objects must not be used from two threads
/// through the same context. An `Operation` is the only holder of its context, so it can
/// move between threads; shared use goes through a `Mutex`.
pub(crate) struct Operation {
    pj: Pj,
}

// Safety: `Operation::build` guarantees that `pj.ctx` has no other strong or weak
// references, and the `Pj` is never handed out, so the PJ and its context are only ever
// reachable through this value.
unsafe impl Send for Operation {}

impl Operation {
    /// Creates a fresh context configured from `data_dir` and builds an operation in it.
    ///
    /// Every intermediate object created by `build` must be dropped before it returns.
    pub fn build<F>(data_dir: &DataDir, build: F) -> Result<Self, ProjError>
    where
        F: FnOnce(&Rc<ThreadContext>) -> Result<Pj, ProjError>,
    {
        let ctx = Rc::new(ThreadContext::new(data_dir));
        let pj = build(&ctx)?;
        drop(ctx);
        if Rc::strong_count(&pj.ctx) != 1 || Rc::weak_count(&pj.ctx) != 0 {
            return Err(ProjError::InvalidArgument(
                "operation context is still shared".to_string(),
            ));
        }
        Ok(Operation { pj })
    }

    pub fn has_inverse(&self) -> bool {
        self.pj.info().1
    }

    pub fn definition(&self) -> Option<String> {
        self.pj.info().0
    }

    pub fn angular_input(&self, direction: Direction) -> bool {
        self.pj.angular_input(direction)
    }

    pub fn angular_output(&self, direction: Direction) -> bool {
        self.pj.angular_output(direction)
    }

    /// Transforms one coordinate, failing with [`ProjError::PointOutOfDomain`] when PROJ
    /// flags the point or produces a non-finite result.
    pub fn trans(
        &mut self,
        direction: Direction,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(f64, f64, f64), ProjError> {
        self.pj.errno_reset();
        let coord = proj_sys::PJ_COORD {
            xyzt: proj_sys::PJ_XYZT {
                x,
                y,
                z,
                t: f64::INFINITY,
            },
        };
        let out = self.pj.trans(direction.into(), coord);
        let errno = self.pj.errno();
        if !errno.is_ok() {
            let message = errno.message(&self.pj.ctx);
            self.pj.errno_reset();
            return Err(ProjError::PointOutOfDomain(format!(
                "({x}, {y}, {z}): {message}"
            )));
        }
        // Safety: every member of the union is made of plain doubles
        let (x2, y2, z2) = unsafe { (out.xyzt.x, out.xyzt.y, out.xyzt.z) };
        if !(x2.is_finite() && y2.is_finite() && z2.is_finite()) {
            return Err(ProjError::PointOutOfDomain(format!(
                "({x}, {y}, {z}) has no finite image"
            )));
        }
        Ok((x2, y2, z2))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ctx() -> Rc<ThreadContext> {
        Rc::new(ThreadContext::new(&DataDir::global()))
    }

    #[test]
    fn test_from_definition() {
        let pj = Pj::from_definition(ctx(), "+proj=longlat +ellps=GRS80 +type=crs").unwrap();
        assert!(pj.is_crs());
        assert_eq!(pj.pj_type(), proj_sys::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_2D_CRS);
    }

    #[test]
    fn test_bad_wkt_reports_grammar_error() {
        let err = Pj::from_wkt(ctx(), "GEOGCS[\"broken\",DATUM[").err().unwrap();
        assert!(matches!(err, ProjError::InvalidDefinition(_)));
    }

    #[test]
    fn test_unknown_code() {
        let err = Pj::from_database(ctx(), "EPSG", "123456").err().unwrap();
        assert_eq!(
            err,
            ProjError::UnknownAuthorityCode {
                authority: "EPSG".to_string(),
                code: "123456".to_string()
            }
        );
    }

    #[test]
    fn test_ellipsoid_and_axes() {
        let pj = Pj::from_database(ctx(), "EPSG", "4326").unwrap();
        assert_eq!(pj.id(), Some(("EPSG".to_string(), "4326".to_string())));
        let ellipsoid = pj.ellipsoid().unwrap().ellipsoid_parameters().unwrap().unwrap();
        assert_eq!(ellipsoid.semi_major(), 6378137.0);
        let axes = pj.coordinate_system().unwrap().axes();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0].abbreviation, "Lat");
        assert!(pj.area_of_use().is_some());
    }

    #[test]
    fn test_operation_roundtrip() {
        let mut operation = Operation::build(&DataDir::global(), |ctx| {
            Pj::from_definition(ctx.clone(), "+proj=utm +zone=33 +ellps=WGS84")
        })
        .unwrap();
        assert!(operation.has_inverse());
        assert!(operation.angular_input(Direction::Forward));
        let (x, y, _) = operation
            .trans(Direction::Forward, 15f64.to_radians(), 0.0, 0.0)
            .unwrap();
        assert!((x - 500000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_shared_context_is_rejected() {
        let mut leaked = Vec::new();
        let result = Operation::build(&DataDir::global(), |ctx| {
            leaked.push(ctx.clone());
            Pj::from_definition(ctx.clone(), "+proj=merc")
        });
        assert!(matches!(result, Err(ProjError::InvalidArgument(_))));
    }
}
