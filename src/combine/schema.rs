//! Compatibility checks when joining artifacts along `filename`.

use crate::artifact::ArtifactSchema;
use crate::constants::FILENAME_DIM;
use crate::dataset::{ArrayData, DataType, Variable};
use crate::error::{CacheError, Result};
use std::path::PathBuf;
use tracing::warn;

/// A data variable of the combined dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedVariable {
    pub name: String,
    /// Dimensions including the leading `filename` axis
    pub dims: Vec<String>,
    pub dtype: DataType,
    pub unit: Option<String>,
    /// Indices of the files that hold this variable
    pub files: Vec<usize>,
}

impl CombinedVariable {
    /// Dimensions within one file, without `filename`
    pub fn file_dims(&self) -> &[String] {
        &self.dims[1..]
    }

    pub fn is_in(&self, file: usize) -> bool {
        self.files.contains(&file)
    }
}

/// Accumulates the union schema, rejecting artifacts that disagree with
/// what has been seen so far.
#[derive(Debug)]
pub(crate) struct SchemaMerge {
    row_dim: String,
    pub(crate) dims: Vec<(String, usize, PathBuf)>,
    pub(crate) coords: Vec<(String, Variable, PathBuf)>,
    pub(crate) variables: Vec<CombinedVariable>,
}

impl SchemaMerge {
    pub(crate) fn new(row_dim: &str) -> Self {
        Self {
            row_dim: row_dim.to_string(),
            dims: Vec::new(),
            coords: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, index: usize, schema: &ArtifactSchema) -> Result<()> {
        let path = schema.path();

        if schema.dim_len(FILENAME_DIM) != Some(1) || schema.filename().is_none() {
            return Err(CacheError::mismatch(
                path,
                format!("missing a length-one {FILENAME_DIM} coordinate"),
            ));
        }
        if schema.coord(&self.row_dim).is_none() {
            return Err(CacheError::mismatch(
                path,
                format!("missing row coordinate {}", self.row_dim),
            ));
        }

        for (dim, len) in &schema.dims {
            if dim == FILENAME_DIM || *dim == self.row_dim {
                continue;
            }
            match self.dims.iter().find(|(d, _, _)| d == dim) {
                Some((_, expected, origin)) if expected != len => {
                    return Err(CacheError::mismatch(
                        path,
                        format!(
                            "dimension {dim} has length {len} but {} has {expected}",
                            origin.display()
                        ),
                    ));
                }
                Some(_) => {}
                None => self.dims.push((dim.clone(), *len, path.to_path_buf())),
            }
        }

        for (name, coord) in &schema.coords {
            if name == FILENAME_DIM || *name == self.row_dim {
                continue;
            }
            match self.coords.iter().find(|(n, _, _)| n == name) {
                Some((_, expected, origin)) if !same_values(&expected.data, &coord.data) => {
                    return Err(CacheError::mismatch(
                        path,
                        format!(
                            "coordinate {name} differs from the values in {}",
                            origin.display()
                        ),
                    ));
                }
                Some(_) => {}
                None => self
                    .coords
                    .push((name.clone(), coord.clone(), path.to_path_buf())),
            }
        }

        for info in &schema.variables {
            if info.dims.first().map(String::as_str) != Some(FILENAME_DIM) {
                return Err(CacheError::mismatch(
                    path,
                    format!("variable {} is not indexed by {FILENAME_DIM}", info.name),
                ));
            }
            match self.variables.iter_mut().find(|v| v.name == info.name) {
                Some(existing) => {
                    if existing.dims != info.dims || existing.dtype != info.dtype {
                        return Err(CacheError::mismatch(
                            path,
                            format!(
                                "variable {} is {} over {:?}, expected {} over {:?}",
                                info.name, info.dtype, info.dims, existing.dtype, existing.dims
                            ),
                        ));
                    }
                    if existing.unit != info.unit {
                        warn!(
                            "Unit of {} in {} is {:?}, keeping {:?}",
                            info.name,
                            path.display(),
                            info.unit,
                            existing.unit
                        );
                    }
                    existing.files.push(index);
                }
                None => self.variables.push(CombinedVariable {
                    name: info.name.clone(),
                    dims: info.dims.clone(),
                    dtype: info.dtype,
                    unit: info.unit.clone(),
                    files: vec![index],
                }),
            }
        }

        Ok(())
    }
}

/// Equal values, treating NaN as equal to NaN and ignoring numeric width
fn same_values(a: &ArrayData, b: &ArrayData) -> bool {
    match (a.to_f64(), b.to_f64()) {
        (Some(x), Some(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(&y)
                    .all(|(p, q)| p == q || (p.is_nan() && q.is_nan()))
        }
        _ => a == b,
    }
}
