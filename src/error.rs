//! Error handling for conversion, caching and combine operations.
//!
//! Every variant that concerns a file carries its path so a failure inside a
//! batch can be traced back to the offending source or artifact.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Failed to read {table} from source file: {path} - {reason}")]
    SourceRead {
        path: PathBuf,
        table: String,
        reason: String,
    },

    #[error("Schema invariant violated for column {column} in file: {path} - {reason}")]
    SchemaInvariant {
        path: PathBuf,
        column: String,
        reason: String,
    },

    #[error("Failed to write cached artifact: {path}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("netCDF error for {path}: {source}")]
    NetCdf {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    #[error("Cannot combine artifact {path}: {detail}")]
    CombineSchemaMismatch { path: PathBuf, detail: String },

    #[error("Variable not found in combined dataset: {name}")]
    VariableNotFound { name: String },

    #[error("Unknown reader: {name}")]
    UnknownReader { name: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File discovery failed for pattern {pattern}: {reason}")]
    Discovery { pattern: String, reason: String },
}

impl CacheError {
    pub fn source_read(
        path: impl Into<PathBuf>,
        table: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SourceRead {
            path: path.into(),
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub fn schema_invariant(
        path: impl Into<PathBuf>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaInvariant {
            path: path.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn netcdf(path: impl Into<PathBuf>, source: netcdf::Error) -> Self {
        Self::NetCdf {
            path: path.into(),
            source,
        }
    }

    pub fn mismatch(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::CombineSchemaMismatch {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
