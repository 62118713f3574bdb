use thiserror::Error;

use crate::constants::{DetectorId, SpectrumNumber};

/// Coarse classification of [`SpecGeomError`].
///
/// Callers that only need to branch on the failure class (and not on the
/// payload) should match on [`SpecGeomError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Spectrum or detector outside the valid domain of a contiguous index.
    OutOfRange,
    /// Well-formed key absent from a general index or from the neighbour graph.
    NotFound,
    /// Malformed input (unmapped detector in a batch, bad neighbour count, ...).
    InvalidArgument,
    /// No position could be resolved, or no index is associated with the cache.
    PrecompiledGeometryMissing,
}

#[derive(Error, Debug)]
pub enum SpecGeomError {
    #[error("Value {value} is outside the contiguous range [{start}, {end}]")]
    OutOfRange { value: i64, start: i64, end: i64 },

    #[error("Spectrum not found: {0}")]
    SpectrumNotFound(SpectrumNumber),

    #[error("Detector {0} is not mapped to any spectrum")]
    UnmappedDetector(DetectorId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid neighbour parameter: {0}")]
    InvalidNeighbourParameter(String),

    #[error("Precompiled geometry missing: {0}")]
    PrecompiledGeometryMissing(String),
}

impl SpecGeomError {
    pub fn kind(&self) -> ErrorKind {
        use SpecGeomError::*;
        match self {
            OutOfRange { .. } => ErrorKind::OutOfRange,
            SpectrumNotFound(_) => ErrorKind::NotFound,
            UnmappedDetector(_) | InvalidArgument(_) | InvalidNeighbourParameter(_) => {
                ErrorKind::InvalidArgument
            }
            PrecompiledGeometryMissing(_) => ErrorKind::PrecompiledGeometryMissing,
        }
    }
}

impl PartialEq for SpecGeomError {
    fn eq(&self, other: &Self) -> bool {
        use SpecGeomError::*;
        match (self, other) {
            (
                OutOfRange {
                    value: a,
                    start: sa,
                    end: ea,
                },
                OutOfRange {
                    value: b,
                    start: sb,
                    end: eb,
                },
            ) => a == b && sa == sb && ea == eb,
            (SpectrumNotFound(a), SpectrumNotFound(b)) => a == b,
            (UnmappedDetector(a), UnmappedDetector(b)) => a == b,
            (InvalidArgument(a), InvalidArgument(b)) => a == b,
            (InvalidNeighbourParameter(a), InvalidNeighbourParameter(b)) => a == b,
            (PrecompiledGeometryMissing(a), PrecompiledGeometryMissing(b)) => a == b,
            _ => false,
        }
    }
}
