//! Multi-file combined datasets.
//!
//! [`CombinedDataset::open`] scans the metadata of many artifacts in
//! parallel and joins them along `filename`. Only dimensions, attributes and
//! coordinates are read at open time; data variables are read per file when
//! a consumer asks for them. The row axis is ragged: each file keeps its own
//! fibre list.

pub mod frame;
pub mod schema;


pub use schema::CombinedVariable;

use crate::artifact::{ArtifactSchema, read_schema, read_variable};
use crate::constants::{FILENAME_DIM, ROW_KEY};
use crate::dataset::{ArrayData, Variable};
use crate::error::{CacheError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use schema::SchemaMerge;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, info};

/// Extent of a combined dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimSize {
    Fixed(usize),
    /// Per-file lengths along the row axis
    Ragged(Vec<usize>),
}

impl fmt::Display for DimSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimSize::Fixed(n) => write!(f, "{n}"),
            DimSize::Ragged(lens) => {
                let min = lens.iter().min().copied().unwrap_or(0);
                let max = lens.iter().max().copied().unwrap_or(0);
                if min == max {
                    write!(f, "{min} per file")
                } else {
                    write!(f, "{min}..{max} per file")
                }
            }
        }
    }
}

/// One file's share of a loaded variable
#[derive(Debug, Clone, PartialEq)]
pub struct FileBlock {
    pub filename: String,
    /// Shape within the file, without `filename`
    pub shape: Vec<usize>,
    /// `None` when the file lacks the variable
    pub data: Option<ArrayData>,
}

/// A variable loaded across all files
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedArray {
    pub name: String,
    pub dims: Vec<String>,
    pub unit: Option<String>,
    pub blocks: Vec<FileBlock>,
}

impl CombinedArray {
    pub fn block(&self, filename: &str) -> Option<&FileBlock> {
        self.blocks.iter().find(|b| b.filename == filename)
    }

    /// Values of all files holding the variable, concatenated in file order
    pub fn concat(&self) -> Option<ArrayData> {
        let parts: Vec<ArrayData> = self.blocks.iter().filter_map(|b| b.data.clone()).collect();
        ArrayData::concat(&parts)
    }
}

#[derive(Debug, Clone)]
pub struct CombinedDataset {
    row_dim: String,
    files: Vec<ArtifactSchema>,
    dims: Vec<(String, usize)>,
    coords: Vec<(String, Variable)>,
    variables: Vec<CombinedVariable>,
    max_concurrent: usize,
    open_elapsed: Duration,
}

impl CombinedDataset {
    /// Open artifacts as one dataset; files keep the order given
    pub async fn open(paths: &[PathBuf], max_concurrent: usize) -> Result<Self> {
        if paths.is_empty() {
            return Err(CacheError::Configuration {
                message: "No artifacts to combine".to_string(),
            });
        }

        let start = Instant::now();
        let max_concurrent = max_concurrent.max(1);
        let files: Vec<ArtifactSchema> = stream::iter(paths.to_vec())
            .map(|path| async move {
                task::spawn_blocking(move || read_schema(&path))
                    .await
                    .unwrap_or_else(|e| Err(CacheError::Io(std::io::Error::other(e))))
            })
            .buffered(max_concurrent)
            .try_collect()
            .await?;

        let mut merge = SchemaMerge::new(ROW_KEY);
        for (index, schema) in files.iter().enumerate() {
            merge.add(index, schema)?;
        }

        let open_elapsed = start.elapsed();
        info!(
            "Opened {} artifacts in {:.2} s",
            files.len(),
            open_elapsed.as_secs_f64()
        );

        Ok(Self {
            row_dim: ROW_KEY.to_string(),
            dims: merge.dims.into_iter().map(|(d, len, _)| (d, len)).collect(),
            coords: merge.coords.into_iter().map(|(n, v, _)| (n, v)).collect(),
            variables: merge.variables,
            files,
            max_concurrent,
            open_elapsed,
        })
    }

    /// Number of files on the `filename` axis
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn row_dim(&self) -> &str {
        &self.row_dim
    }

    pub fn open_elapsed(&self) -> Duration {
        self.open_elapsed
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(ArtifactSchema::path).collect()
    }

    /// Labels along the `filename` axis
    pub fn filenames(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(|f| f.filename().unwrap_or_default())
            .collect()
    }

    pub fn row_counts(&self) -> Vec<usize> {
        self.files
            .iter()
            .map(|f| f.dim_len(&self.row_dim).unwrap_or(0))
            .collect()
    }

    /// Row coordinate of file `index`
    pub fn row_coord(&self, index: usize) -> Option<&Variable> {
        self.files.get(index)?.coord(&self.row_dim)
    }

    /// All dimensions: `filename`, the ragged row axis, then shared axes
    pub fn dims(&self) -> Vec<(String, DimSize)> {
        let mut dims = vec![
            (FILENAME_DIM.to_string(), DimSize::Fixed(self.files.len())),
            (self.row_dim.clone(), DimSize::Ragged(self.row_counts())),
        ];
        dims.extend(
            self.dims
                .iter()
                .map(|(d, len)| (d.clone(), DimSize::Fixed(*len))),
        );
        dims
    }

    /// Length of a shared (non-row) dimension
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        if dim == FILENAME_DIM {
            return Some(self.files.len());
        }
        self.dims.iter().find(|(d, _)| d == dim).map(|(_, len)| *len)
    }

    /// Shared coordinate, identical in every file
    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn coord_names(&self) -> Vec<&str> {
        self.coords.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn variables(&self) -> &[CombinedVariable] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&CombinedVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Read one variable from every file that has it
    pub async fn load_variable(&self, name: &str) -> Result<CombinedArray> {
        let variable = self
            .variable(name)
            .ok_or_else(|| CacheError::VariableNotFound {
                name: name.to_string(),
            })?
            .clone();
        debug!("Loading {} from {} files", name, variable.files.len());

        let jobs: Vec<(usize, PathBuf, String)> = self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| {
                (
                    i,
                    f.path.clone(),
                    f.filename().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let blocks: Vec<FileBlock> = stream::iter(jobs)
            .map(|(index, path, filename)| {
                let variable = &variable;
                async move {
                    let Some(info) = self.files[index].variable(&variable.name) else {
                        return Ok(FileBlock {
                            filename,
                            shape: Vec::new(),
                            data: None,
                        });
                    };
                    let shape = info.shape[1..].to_vec();
                    let name = variable.name.clone();
                    let task_path = path.clone();
                    let loaded = task::spawn_blocking(move || read_variable(&task_path, &name))
                        .await
                        .unwrap_or_else(|e| Err(CacheError::Io(std::io::Error::other(e))))?;
                    if loaded.dims != variable.dims {
                        return Err(CacheError::mismatch(
                            path,
                            format!("variable {} changed since the dataset was opened", variable.name),
                        ));
                    }
                    Ok(FileBlock {
                        filename,
                        shape,
                        data: Some(loaded.data),
                    })
                }
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        Ok(CombinedArray {
            name: variable.name.clone(),
            dims: variable.file_dims().to_vec(),
            unit: variable.unit.clone(),
            blocks,
        })
    }
}
