use std::{ffi, path::PathBuf, str};
use thiserror::Error;

/// Errors produced while building CRSs, solving geodesics or transforming points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjError {
    #[error("Invalid CRS definition: {0}")]
    InvalidDefinition(String),
    #[error("The authority code {authority}:{code} could not be resolved")]
    UnknownAuthorityCode { authority: String, code: String },
    #[error("The definition {input:?} matches {candidates} candidate CRSs")]
    AmbiguousDefinition { input: String, candidates: usize },
    #[error("The CRS has no well-defined ellipsoid: {0}")]
    NotGeographic(String),
    #[error("No EPSG code matches the CRS {0}")]
    NoEpsgMapping(String),
    #[error("The operation has no inverse: {0}")]
    NoInverse(String),
    #[error("No operation found from {source_crs} to {target_crs}: {reason}")]
    NoOperationFound {
        source_crs: String,
        target_crs: String,
        reason: String,
    },
    #[error("Input arrays have mismatched lengths: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("No PROJ data directory found (searched {searched:?})")]
    DataDirNotFound { searched: Vec<PathBuf> },
    #[error("Geodesic solver did not converge after {iterations} iterations")]
    NumericDivergence { iterations: usize },
    #[error("Coordinate outside the valid domain: {0}")]
    PointOutOfDomain(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("The CRS could not be exported: {0}")]
    Export(String),
    #[error("A nul byte was found in a string passed to PROJ: {0}")]
    ArgumentNul(#[from] ffi::NulError),
    #[error("A UTF8 error occurred when reading a string returned by PROJ")]
    Utf8(#[from] str::Utf8Error),
}

impl ProjError {
    /// Errors that affect a single point and may be replaced by a sentinel in lenient mode.
    pub fn is_point_error(&self) -> bool {
        matches!(
            self,
            ProjError::PointOutOfDomain(_) | ProjError::NumericDivergence { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_point_errors() {
        assert!(ProjError::PointOutOfDomain("lat=91".into()).is_point_error());
        assert!(ProjError::NumericDivergence { iterations: 83 }.is_point_error());
        assert!(!ProjError::InvalidDefinition("GEOGCS[".into()).is_point_error());
    }

    #[test]
    fn test_messages() {
        let err = ProjError::UnknownAuthorityCode {
            authority: "EPSG".into(),
            code: "123456".into(),
        };
        assert_eq!(
            err.to_string(),
            "The authority code EPSG:123456 could not be resolved"
        );
        let err = ProjError::ShapeMismatch {
            expected: 3,
            found: 2,
        };
        assert!(err.to_string().contains("expected 3, found 2"));
    }
}
