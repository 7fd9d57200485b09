//! Error types for psr_core operations.
//!
//! A plain enum with a hand-written `Display`, no external dependencies.

use std::fmt;

/// Error types that can occur during psr_core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PsrCoreError {
    /// A matrix that must be symmetric positive definite is not.
    NotPositiveDefinite {
        /// Index of the diagonal pivot that failed.
        pivot: usize,
        /// Value of the failing pivot.
        value: f64,
    },
    /// Flat data does not match the expected shape.
    InvalidShape {
        /// Expected number of values (or row width).
        expected: usize,
        /// Number of values found.
        got: usize,
    },
    /// A scan axis or sample set is empty.
    EmptyAxis {
        /// Name of the empty axis.
        axis: &'static str,
    },
}

impl fmt::Display for PsrCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PsrCoreError::NotPositiveDefinite { pivot, value } => {
                write!(
                    f,
                    "matrix is not positive definite: pivot {} has value {:e}",
                    pivot, value
                )
            }
            PsrCoreError::InvalidShape { expected, got } => {
                write!(f, "invalid shape: expected {}, got {}", expected, got)
            }
            PsrCoreError::EmptyAxis { axis } => write!(f, "axis '{}' is empty", axis),
        }
    }
}

impl std::error::Error for PsrCoreError {}
