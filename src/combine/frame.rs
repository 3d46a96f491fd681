//! Tabular view of per-row variables as a polars `LazyFrame`.
//!
//! Each file becomes one frame of `filename`, the row key and the requested
//! variables; frames are joined diagonally so a variable missing from some
//! files shows up as nulls there.

use super::CombinedDataset;
use crate::constants::FILENAME_DIM;
use crate::dataset::ArrayData;
use crate::error::{CacheError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Polars column from an array, widening integer types polars is not built for
pub(crate) fn to_column(name: &str, data: ArrayData) -> Column {
    let name = PlSmallStr::from(name);
    match data {
        ArrayData::U8(v) => Column::new(name, v.into_iter().map(i32::from).collect::<Vec<_>>()),
        ArrayData::I8(v) => Column::new(name, v.into_iter().map(i32::from).collect::<Vec<_>>()),
        ArrayData::I16(v) => Column::new(name, v.into_iter().map(i32::from).collect::<Vec<_>>()),
        ArrayData::U16(v) => Column::new(name, v.into_iter().map(i32::from).collect::<Vec<_>>()),
        ArrayData::I32(v) => Column::new(name, v),
        ArrayData::U32(v) => Column::new(name, v),
        ArrayData::I64(v) => Column::new(name, v),
        ArrayData::U64(v) => Column::new(name, v),
        ArrayData::F32(v) => Column::new(name, v),
        ArrayData::F64(v) => Column::new(name, v),
        ArrayData::Str(v) => Column::new(name, v),
    }
}

impl CombinedDataset {
    /// Lazy table of `filename`, the row key and the named per-row variables
    pub async fn frame(&self, names: &[String]) -> Result<LazyFrame> {
        for name in names {
            let variable = self
                .variable(name)
                .ok_or_else(|| CacheError::VariableNotFound { name: name.clone() })?;
            let dims = variable.file_dims();
            if dims.len() != 1 || dims[0] != self.row_dim() {
                let path = variable
                    .files
                    .first()
                    .map(|&i| self.files[i].path.clone())
                    .unwrap_or_default();
                return Err(CacheError::schema_invariant(
                    path,
                    name.clone(),
                    format!(
                        "only variables over {} alone can be tabulated, found {:?}",
                        self.row_dim(),
                        dims
                    ),
                ));
            }
        }

        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            loaded.push(self.load_variable(name).await?);
        }

        let rows = self.row_counts();
        let mut frames = Vec::with_capacity(self.len());
        for (index, filename) in self.filenames().into_iter().enumerate() {
            let mut columns = vec![Column::new(
                PlSmallStr::from(FILENAME_DIM),
                vec![filename.to_string(); rows[index]],
            )];
            if let Some(key) = self.row_coord(index) {
                columns.push(to_column(self.row_dim(), key.data.clone()));
            }
            for array in &loaded {
                if let Some(data) = &array.blocks[index].data {
                    columns.push(to_column(&array.name, data.clone()));
                }
            }
            frames.push(DataFrame::new(columns)?.lazy());
        }

        Ok(concat_lf_diagonal(frames, UnionArgs::default())?)
    }

    /// Collect [`Self::frame`] and write it to a parquet file; returns the row count
    pub async fn export_parquet(&self, names: &[String], output: &Path) -> Result<usize> {
        let mut df = self.frame(names).await?.collect()?;
        let file = File::create(output).map_err(|source| CacheError::CacheWrite {
            path: output.to_path_buf(),
            source,
        })?;
        ParquetWriter::new(file).finish(&mut df)?;

        info!("Wrote {} rows to {}", df.height(), output.display());
        Ok(df.height())
    }
}
