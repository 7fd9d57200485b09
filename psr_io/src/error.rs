//! Error types for psr_io operations.

use thiserror::Error;

/// Errors that can occur while reading or writing reconstruction data.
#[derive(Error, Debug)]
pub enum PsrIoError {
    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write an `.npz` archive.
    #[error("npz write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),

    /// Failed to read an `.npz` archive.
    #[error("npz read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An array has an unexpected shape.
    #[error("shape mismatch for '{name}': expected {expected:?}, got {got:?}")]
    Shape {
        /// Array name.
        name: String,
        /// Expected shape (0 = any extent).
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// A required array is missing from an archive.
    #[error("array '{name}' missing from archive")]
    MissingArray {
        /// Array name.
        name: String,
    },
}

/// Result type for psr_io operations.
pub type Result<T> = std::result::Result<T, PsrIoError>;
