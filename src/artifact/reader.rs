//! Artifact reading: schema scans and on-demand variable loads.

use super::writer::unravel;
use super::{ArtifactSchema, VariableInfo};
use crate::constants::UNIT_ATTR;
use crate::dataset::{ArrayData, DataType, LabeledDataset, Variable};
use crate::error::{CacheError, Result};
use netcdf::AttributeValue;
use netcdf::types::{FloatType, IntType, NcVariableType};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Read dimensions, attributes and coordinates; data variables are described
/// but not loaded.
pub fn read_schema(path: &Path) -> Result<ArtifactSchema> {
    let file = netcdf::open(path).map_err(|e| CacheError::netcdf(path, e))?;

    let dims = file
        .dimensions()
        .map(|d| (d.name(), d.len()))
        .collect::<Vec<_>>();

    let mut attrs = BTreeMap::new();
    for attr in file.attributes() {
        if let Ok(AttributeValue::Str(value)) = attr.value() {
            attrs.insert(attr.name().to_string(), value);
        }
    }

    let mut coords = Vec::new();
    let mut variables = Vec::new();
    for var in file.variables() {
        let info = describe(&var, path)?;
        if is_coordinate(&info) {
            let data = read_values(&var, &info, path)?;
            coords.push((info.name.clone(), to_variable(info, data)));
        } else {
            variables.push(info);
        }
    }

    debug!(
        "Scanned {}: {} coords, {} variables",
        path.display(),
        coords.len(),
        variables.len()
    );

    Ok(ArtifactSchema {
        path: path.to_path_buf(),
        dims,
        coords,
        variables,
        attrs,
    })
}

/// Load one variable's values
pub fn read_variable(path: &Path, name: &str) -> Result<Variable> {
    let file = netcdf::open(path).map_err(|e| CacheError::netcdf(path, e))?;
    let var = file
        .variable(name)
        .ok_or_else(|| CacheError::VariableNotFound {
            name: name.to_string(),
        })?;
    let info = describe(&var, path)?;
    let data = read_values(&var, &info, path)?;
    Ok(to_variable(info, data))
}

/// Load a whole artifact back into memory
pub fn read_artifact(path: &Path) -> Result<LabeledDataset> {
    let schema = read_schema(path)?;
    let mut ds = LabeledDataset::new();
    ds.attrs = schema.attrs;
    for (name, var) in schema.coords {
        ds.set_coord(name, var);
    }
    for info in &schema.variables {
        ds.set_data_var(info.name.clone(), read_variable(path, &info.name)?);
    }
    Ok(ds)
}

fn is_coordinate(info: &VariableInfo) -> bool {
    info.dims.len() == 1 && info.dims[0] == info.name
}

fn to_variable(info: VariableInfo, data: ArrayData) -> Variable {
    Variable {
        dims: info.dims,
        shape: info.shape,
        data,
        unit: info.unit,
    }
}

fn describe(var: &netcdf::Variable, path: &Path) -> Result<VariableInfo> {
    let name = var.name();
    let dtype = match var.vartype() {
        NcVariableType::Int(IntType::U8) => DataType::U8,
        NcVariableType::Int(IntType::I8) => DataType::I8,
        NcVariableType::Int(IntType::I16) => DataType::I16,
        NcVariableType::Int(IntType::U16) => DataType::U16,
        NcVariableType::Int(IntType::I32) => DataType::I32,
        NcVariableType::Int(IntType::U32) => DataType::U32,
        NcVariableType::Int(IntType::I64) => DataType::I64,
        NcVariableType::Int(IntType::U64) => DataType::U64,
        NcVariableType::Float(FloatType::F32) => DataType::F32,
        NcVariableType::Float(FloatType::F64) => DataType::F64,
        NcVariableType::String => DataType::Str,
        other => {
            return Err(CacheError::mismatch(
                path,
                format!("variable {name} has unsupported netCDF type {other:?}"),
            ));
        }
    };

    let unit = match var.attribute_value(UNIT_ATTR) {
        Some(Ok(AttributeValue::Str(unit))) => Some(unit),
        _ => None,
    };

    Ok(VariableInfo {
        dims: var.dimensions().iter().map(|d| d.name()).collect(),
        shape: var.dimensions().iter().map(|d| d.len()).collect(),
        name,
        dtype,
        unit,
    })
}

fn read_values(var: &netcdf::Variable, info: &VariableInfo, path: &Path) -> Result<ArrayData> {
    let size: usize = info.shape.iter().product();
    if size == 0 {
        return Ok(ArrayData::with_capacity(info.dtype, 0));
    }

    let nc = |e| CacheError::netcdf(path, e);
    let data = match info.dtype {
        DataType::U8 => ArrayData::U8(var.get_values(..).map_err(nc)?),
        DataType::I8 => ArrayData::I8(var.get_values(..).map_err(nc)?),
        DataType::I16 => ArrayData::I16(var.get_values(..).map_err(nc)?),
        DataType::U16 => ArrayData::U16(var.get_values(..).map_err(nc)?),
        DataType::I32 => ArrayData::I32(var.get_values(..).map_err(nc)?),
        DataType::U32 => ArrayData::U32(var.get_values(..).map_err(nc)?),
        DataType::I64 => ArrayData::I64(var.get_values(..).map_err(nc)?),
        DataType::U64 => ArrayData::U64(var.get_values(..).map_err(nc)?),
        DataType::F32 => ArrayData::F32(var.get_values(..).map_err(nc)?),
        DataType::F64 => ArrayData::F64(var.get_values(..).map_err(nc)?),
        DataType::Str => {
            let mut values = Vec::with_capacity(size);
            for flat in 0..size {
                let index = unravel(flat, &info.shape);
                values.push(get_string_at(var, &index).map_err(nc)?);
            }
            ArrayData::Str(values)
        }
    };
    Ok(data)
}

fn get_string_at(var: &netcdf::Variable, index: &[usize]) -> netcdf::Result<String> {
    match *index {
        [] => var.get_string(..),
        [i] => var.get_string([i]),
        [i, j] => var.get_string([i, j]),
        [i, j, k] => var.get_string([i, j, k]),
        [i, j, k, l] => var.get_string([i, j, k, l]),
        _ => Err(netcdf::Error::Str(format!(
            "string variables with {} dimensions are not supported",
            index.len()
        ))),
    }
}
