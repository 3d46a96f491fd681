//! Labelled, dimensional datasets.
//!
//! A [`LabeledDataset`] is the in-memory form of one converted table: data
//! variables tagged with ordered dimension names, plus coordinate variables
//! giving values along some of those dimensions. It is what readers produce
//! and what a cached artifact stores.

pub mod array;

pub use array::{ArrayData, DataType, round_to};

use std::collections::BTreeMap;
use std::fmt;

/// One named array with its dimension labels
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: ArrayData,
    /// Physical unit; coordinates carry none
    pub unit: Option<String>,
}

impl Variable {
    pub fn new(dims: Vec<String>, shape: Vec<usize>, data: ArrayData) -> Self {
        Self {
            dims,
            shape,
            data,
            unit: None,
        }
    }

    /// One-dimensional variable along `dim`
    pub fn vector(dim: impl Into<String>, data: ArrayData) -> Self {
        let len = data.len();
        Self::new(vec![dim.into()], vec![len], data)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    /// Number of elements implied by the shape
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Structural inconsistency inside a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetShapeError {
    pub variable: String,
    pub reason: String,
}

impl fmt::Display for DatasetShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variable, self.reason)
    }
}

/// Coordinates and data variables in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledDataset {
    coords: Vec<(String, Variable)>,
    data_vars: Vec<(String, Variable)>,
    pub attrs: BTreeMap<String, String>,
}

impl LabeledDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a coordinate
    pub fn set_coord(&mut self, name: impl Into<String>, var: Variable) {
        upsert(&mut self.coords, name.into(), var);
    }

    /// Insert or replace a data variable
    pub fn set_data_var(&mut self, name: impl Into<String>, var: Variable) {
        upsert(&mut self.data_vars, name.into(), var);
    }

    pub fn coord(&self, name: &str) -> Option<&Variable> {
        lookup(&self.coords, name)
    }

    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        lookup(&self.data_vars, name)
    }

    pub fn coords(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.coords.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn data_vars(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.data_vars.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn data_var_names(&self) -> Vec<&str> {
        self.data_vars.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Dimension lengths in order of first appearance (coordinates first)
    pub fn dims(&self) -> Vec<(String, usize)> {
        let mut dims: Vec<(String, usize)> = Vec::new();
        for (_, var) in self.coords.iter().chain(self.data_vars.iter()) {
            for (dim, &len) in var.dims.iter().zip(&var.shape) {
                if !dims.iter().any(|(d, _)| d == dim) {
                    dims.push((dim.clone(), len));
                }
            }
        }
        dims
    }

    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims()
            .into_iter()
            .find(|(d, _)| d == dim)
            .map(|(_, len)| len)
    }

    /// Check shapes against data lengths and dimension lengths across
    /// variables. Coordinates must be one-dimensional along their own name.
    pub fn validate(&self) -> Result<(), DatasetShapeError> {
        let mut lengths: BTreeMap<&str, (usize, &str)> = BTreeMap::new();

        for (name, var) in self.coords.iter().chain(self.data_vars.iter()) {
            let name = name.as_str();
            if var.dims.len() != var.shape.len() {
                return Err(shape_error(
                    name,
                    format!("{} dims for a {}-d shape", var.dims.len(), var.shape.len()),
                ));
            }
            if var.size() != var.data.len() {
                return Err(shape_error(
                    name,
                    format!("shape {:?} holds {} values", var.shape, var.data.len()),
                ));
            }
            for (dim, &len) in var.dims.iter().zip(&var.shape) {
                match lengths.get(dim.as_str()) {
                    Some(&(expected, owner)) if expected != len => {
                        return Err(shape_error(
                            name,
                            format!(
                                "dimension {dim} has length {len} but {owner} gives {expected}"
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        lengths.insert(dim.as_str(), (len, name));
                    }
                }
            }
        }

        for (name, var) in &self.coords {
            if var.dims.len() != 1 || var.dims[0] != *name {
                return Err(shape_error(
                    name,
                    format!("coordinate must be indexed by itself, found dims {:?}", var.dims),
                ));
            }
        }

        Ok(())
    }

    /// Prepend a length-one dimension to every data variable and record
    /// `label` as its coordinate.
    pub fn expand_dims(mut self, dim: &str, label: impl Into<String>) -> Self {
        for (_, var) in self.data_vars.iter_mut() {
            var.dims.insert(0, dim.to_string());
            var.shape.insert(0, 1);
        }
        self.coords.insert(
            0,
            (
                dim.to_string(),
                Variable::vector(dim, ArrayData::Str(vec![label.into()])),
            ),
        );
        self
    }
}

fn upsert(entries: &mut Vec<(String, Variable)>, name: String, var: Variable) {
    match entries.iter_mut().find(|(n, _)| *n == name) {
        Some(entry) => entry.1 = var,
        None => entries.push((name, var)),
    }
}

fn lookup<'a>(entries: &'a [(String, Variable)], name: &str) -> Option<&'a Variable> {
    entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn shape_error(variable: &str, reason: String) -> DatasetShapeError {
    DatasetShapeError {
        variable: variable.to_string(),
        reason,
    }
}
