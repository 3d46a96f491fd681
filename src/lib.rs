//! WEAVE netCDF cache
//!
//! Converts tables from WEAVE survey FITS files into labelled netCDF-4
//! artifacts, keeps them in an on-disk cache keyed by source path and table,
//! and opens many artifacts as one lazily-loaded dataset.
//!
//! This library provides tools for:
//! - Decoding FITS binary tables into dimension-labelled datasets
//! - Converting each source once and reusing the cached artifact afterwards
//! - Batch conversion with bounded concurrency and progress reporting
//! - Joining artifacts along a `filename` axis, reading data on demand
//! - Exporting per-fibre variables to polars and Parquet

pub mod artifact;
pub mod cache;
pub mod cli;
pub mod combine;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod fits;
pub mod models;
pub mod progress;
pub mod readers;

// Re-export commonly used types
pub use cache::{ConversionCache, canonical_path};
pub use combine::{CombinedArray, CombinedDataset};
pub use config::{CacheConfig, DiscoveryConfig};
pub use dataset::{ArrayData, LabeledDataset, Variable};
pub use discovery::{Resolution, SourceQuery, list_source_files, lr_l2_stack_files};
pub use error::{CacheError, Result};
pub use readers::{ReaderRegistry, TableReader};
