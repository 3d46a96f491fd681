//! Cached artifacts: one netCDF-4 file per (reader, source file).
//!
//! Layout follows the xarray convention: a variable whose single dimension
//! carries its own name is a coordinate, everything else is a data variable.
//! Each variable has a `unit` attribute; global attributes record the table
//! and source path.

pub mod reader;
pub mod writer;

pub use reader::{read_artifact, read_schema, read_variable};
pub use writer::write_artifact;

use crate::constants::{FILENAME_DIM, SOURCE_ATTR, TABLE_ATTR};
use crate::dataset::{ArrayData, DataType, Variable};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata of one data variable; values stay on disk
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub dtype: DataType,
    pub unit: Option<String>,
}

/// Everything about an artifact except its data variable values.
///
/// Coordinates are small and read eagerly so that artifacts can be compared
/// before anything else is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSchema {
    pub path: PathBuf,
    pub dims: Vec<(String, usize)>,
    pub coords: Vec<(String, Variable)>,
    pub variables: Vec<VariableInfo>,
    pub attrs: BTreeMap<String, String>,
}

impl ArtifactSchema {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims.iter().find(|(d, _)| d == dim).map(|(_, len)| *len)
    }

    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Source base name recorded on the `filename` axis
    pub fn filename(&self) -> Option<&str> {
        match &self.coord(FILENAME_DIM)?.data {
            ArrayData::Str(labels) => labels.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        self.attrs.get(TABLE_ATTR).map(String::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.attrs.get(SOURCE_ATTR).map(String::as_str)
    }
}
