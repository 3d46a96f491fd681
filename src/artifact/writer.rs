//! Atomic netCDF writer.
//!
//! The artifact is written to a `.partial` sibling and renamed into place
//! once the netCDF file has been closed, so the canonical path only ever
//! holds complete artifacts. A failed write leaves no trace: the temporary
//! path is removed when dropped. Artifacts get the same permissions as any
//! file created under the process umask, so other users of a shared cache
//! root can read them.

use crate::constants::{PARTIAL_SUFFIX, UNIT_ATTR};
use crate::dataset::{ArrayData, LabeledDataset, Variable};
use crate::error::{CacheError, Result};
use std::path::Path;
use tracing::debug;

pub fn write_artifact(ds: &LabeledDataset, path: &Path) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .map(|name| format!("{}.", name.to_string_lossy()))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(PARTIAL_SUFFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let temp_path = builder
        .tempfile_in(parent)
        .map_err(|source| CacheError::CacheWrite {
            path: path.to_path_buf(),
            source,
        })?
        .into_temp_path();

    write_netcdf(ds, &temp_path).map_err(|source| CacheError::netcdf(path, source))?;

    temp_path.persist(path).map_err(|e| CacheError::CacheWrite {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!("Wrote artifact {}", path.display());
    Ok(())
}

/// Write the whole dataset; the file is closed when this returns
fn write_netcdf(ds: &LabeledDataset, path: &Path) -> netcdf::Result<()> {
    let mut file = netcdf::create(path)?;

    for (name, value) in &ds.attrs {
        file.add_attribute(name, value.as_str())?;
    }

    for (dim, len) in ds.dims() {
        file.add_dimension(&dim, len)?;
    }

    for (name, var) in ds.coords().chain(ds.data_vars()) {
        write_variable(&mut file, name, var)?;
    }

    Ok(())
}

fn write_variable(file: &mut netcdf::FileMut, name: &str, var: &Variable) -> netcdf::Result<()> {
    let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();

    macro_rules! numeric {
        ($t:ty, $values:expr) => {{
            let mut nc_var = file.add_variable::<$t>(name, &dims)?;
            if !$values.is_empty() {
                nc_var.put_values($values.as_slice(), ..)?;
            }
            nc_var
        }};
    }

    let mut nc_var = match &var.data {
        ArrayData::U8(v) => numeric!(u8, v),
        ArrayData::I8(v) => numeric!(i8, v),
        ArrayData::I16(v) => numeric!(i16, v),
        ArrayData::U16(v) => numeric!(u16, v),
        ArrayData::I32(v) => numeric!(i32, v),
        ArrayData::U32(v) => numeric!(u32, v),
        ArrayData::I64(v) => numeric!(i64, v),
        ArrayData::U64(v) => numeric!(u64, v),
        ArrayData::F32(v) => numeric!(f32, v),
        ArrayData::F64(v) => numeric!(f64, v),
        ArrayData::Str(v) => {
            let mut nc_var = file.add_string_variable(name, &dims)?;
            for (flat, value) in v.iter().enumerate() {
                let index = unravel(flat, &var.shape);
                put_string_at(&mut nc_var, value, &index)?;
            }
            nc_var
        }
    };

    if let Some(unit) = &var.unit {
        nc_var.put_attribute(UNIT_ATTR, unit.as_str())?;
    }
    Ok(())
}

/// Row-major flat index to per-axis index
pub(crate) fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (axis, &len) in shape.iter().enumerate().rev() {
        if len > 0 {
            index[axis] = flat % len;
            flat /= len;
        }
    }
    index
}

fn put_string_at(var: &mut netcdf::VariableMut, value: &str, index: &[usize]) -> netcdf::Result<()> {
    match *index {
        [] => var.put_string(value, ..),
        [i] => var.put_string(value, [i]),
        [i, j] => var.put_string(value, [i, j]),
        [i, j, k] => var.put_string(value, [i, j, k]),
        [i, j, k, l] => var.put_string(value, [i, j, k, l]),
        _ => Err(netcdf::Error::Str(format!(
            "string variables with {} dimensions are not supported",
            index.len()
        ))),
    }
}
