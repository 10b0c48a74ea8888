//! `geoproj` describes coordinate reference systems, solves geodesic problems on the
//! ellipsoid and transforms coordinates between CRSs, on top of the
//! [PROJ](https://proj.org) library.
//!
//! The crate is organised around four entry points:
//!
//! - [`Crs`]: a coordinate reference system built from WKT, a PROJ string, PROJJSON, an
//!   `authority:code` pair, an EPSG code or a map of PROJ parameters. Datum, ellipsoid,
//!   axes and area of use are read lazily and cached.
//! - [`Geod`]: direct and inverse geodesic problems, waypoints and line lengths on one
//!   ellipsoid. These are computed in Rust and need no PROJ data.
//! - [`Proj`]: the projection of one CRS, mapping longitude/latitude to its native
//!   coordinates and back.
//! - [`Transformer`]: the operation PROJ selects between two CRSs, applied eagerly to a
//!   [`PointBatch`] or lazily to any sequence of [`Coord`]s.
//!
//! # Axis order
//!
//! Every transformer states the axis order it works in. [`AxisOrder::Authority`] follows
//! the CRS definitions (latitude first for `EPSG:4326`), [`AxisOrder::Traditional`] puts
//! longitude or easting first on both ends.
//!
//! # Data directory
//!
//! Authority codes are resolved through PROJ's `proj.db`. Its directory is found by
//! [`DataDir`], from an explicit [`set_data_dir`] call, the `PROJ_DATA` (or legacy
//! `PROJ_LIB`) environment variable, a `proj_data` directory next to the executable or a
//! system install, in that order. WKT and PROJ strings are still parsed when no database
//! is found; authority codes then fail with [`ProjError::DataDirNotFound`].
//!
//! # Logging
//!
//! Diagnostics, including PROJ's own, go through the [`log`](https://docs.rs/log) facade.
//!
//! # Requirements
//!
//! The crate links against a system `libproj` (9.x) through `proj-sys`. The `bundled_proj`
//! feature builds PROJ from source instead.
//!
//! The `geo-types` feature (on by default) implements [`Coord`] for
//! [`geo_types`](https://docs.rs/geo-types) coordinates and points and provides the
//! [`Transform`] trait for geometries.
//!
//! # Example
//!
//! ```
//! # use approx::assert_relative_eq;
//! use geoproj::{AxisOrder, Crs, ErrorPolicy, Geod, PointBatch, Transformer};
//!
//! let wgs84 = Crs::from_epsg(4326).unwrap();
//! let utm = Crs::from_user_input("+proj=utm +zone=33 +datum=WGS84 +units=m").unwrap();
//!
//! let transformer = Transformer::from_crs(&wgs84, &utm, AxisOrder::Traditional).unwrap();
//! let batch = PointBatch::from_xy(&[15.0, 16.0], &[0.0, 48.0]).unwrap();
//! let projected = transformer.transform(&batch, ErrorPolicy::Strict).unwrap();
//! assert_relative_eq!(projected.xs()[0], 500000.0, epsilon = 1e-6);
//!
//! let geod: Geod = wgs84.get_geod().unwrap();
//! let (_, _, dist) = geod.inverse(0.0, 15.0, 48.0, 16.0).unwrap();
//! assert!(dist > 5_000_000.0);
//! ```

mod context;
mod crs;
mod cstring_array;
mod datadir;
mod ellipsoid;
mod errno;
mod error;
mod geod;
mod geodesic;
#[cfg(feature = "geo-types")]
mod geo_types;
mod parse;
mod pj;
mod proj;
mod transform;

pub use crate::crs::{AreaOfUse, Axis, Crs, CrsKind, Datum, PrimeMeridian, Validity, WktVersion};
pub use crate::datadir::{
    get_data_dir, set_data_dir, DataDir, BUNDLED_DATA_DIR, DATA_DIR_ENV_VARS,
};
pub use crate::ellipsoid::{ellipsoid_names, Ellipsoid};
pub use crate::error::ProjError;
pub use crate::geod::{Geod, Waypoints};
pub use crate::geodesic::DEFAULT_MAX_ITERATIONS;
#[cfg(feature = "geo-types")]
pub use crate::geo_types::Transform;
pub use crate::parse::{looks_like_wkt, CrsInput, ParserOptions};
pub use crate::proj::{AngleUnit, Proj};
pub use crate::transform::{
    itransform, transform, AxisOrder, Coord, CoordinateType, ErrorPolicy, PointBatch,
    TransformIter, TransformOptions, Transformer,
};
