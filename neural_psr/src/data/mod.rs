//! Scan datasets held as tensors.

mod dataset;

pub use dataset::ScanDataset;
