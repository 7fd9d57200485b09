//! Error types for neural_psr.

use thiserror::Error;

use crate::lattice::ElementParameter;

/// Errors that can occur while building or training a reconstruction.
#[derive(Error, Debug)]
pub enum NeuralPsrError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// A scan knob refers to an element that does not exist.
    #[error("element index {index} out of range for lattice of {len} elements")]
    ElementIndexOutOfRange {
        /// Requested element index.
        index: usize,
        /// Number of elements in the lattice.
        len: usize,
    },

    /// A scan knob refers to a parameter the element does not have.
    #[error("element {index} ({kind}) has no parameter {parameter:?}")]
    UnsupportedParameter {
        /// Element index.
        index: usize,
        /// Element kind name.
        kind: &'static str,
        /// Requested parameter.
        parameter: ElementParameter,
    },

    /// The dataset holds no configurations.
    #[error("dataset is empty")]
    EmptyDataset,

    /// The loss became NaN or infinite.
    #[error("non-finite loss {value} at epoch {epoch}, step {step}")]
    NonFiniteLoss {
        /// Epoch index.
        epoch: usize,
        /// Global step index.
        step: usize,
        /// Offending loss value.
        value: f64,
    },

    /// The loss was finite but its gradient or the updated generator was not.
    #[error("non-finite gradient at epoch {epoch}, step {step}")]
    NonFiniteGradient {
        /// Epoch index.
        epoch: usize,
        /// Global step index.
        step: usize,
    },

    /// The Lagrange multiplier left the admissible range.
    #[error("Lagrange multiplier must be positive and finite, got {value}")]
    InvalidMultiplier {
        /// Offending value.
        value: f64,
    },

    /// Tensor data could not be converted.
    #[error("tensor data error: {0}")]
    TensorData(String),

    /// Module record could not be saved or loaded.
    #[error("record error: {0}")]
    Record(String),

    /// Math error from psr_core.
    #[error("core error: {0}")]
    Core(#[from] psr_core::PsrCoreError),

    /// I/O error from psr_io.
    #[error("I/O error: {0}")]
    Io(#[from] psr_io::PsrIoError),
}

impl NeuralPsrError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        NeuralPsrError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for neural_psr operations.
pub type Result<T> = std::result::Result<T, NeuralPsrError>;
