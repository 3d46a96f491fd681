//! Table-driven labelling rules.
//!
//! A [`RuleSet`] turns a decoded FITS table into a [`LabeledDataset`]: the row
//! key becomes the row coordinate, promotion rules lift row-invariant columns
//! into shared coordinates, and dimension rules give every remaining column
//! its extra axes. Rules are tried in order and the first match wins.

use crate::constants::{COORD_ROUND_DECIMALS, NO_UNIT};
use crate::dataset::{ArrayData, LabeledDataset, Variable, round_to};
use crate::error::{CacheError, Result};
use crate::fits::{Column, Table};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Predicate over column names
#[derive(Debug, Clone)]
pub enum NameMatch {
    Exact(&'static str),
    Prefix(&'static str),
    Suffix(&'static str),
    Contains(&'static str),
    Not(Box<NameMatch>),
    All(Vec<NameMatch>),
    Any(Vec<NameMatch>),
}

impl NameMatch {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Exact(s) => name == *s,
            NameMatch::Prefix(s) => name.starts_with(s),
            NameMatch::Suffix(s) => name.ends_with(s),
            NameMatch::Contains(s) => name.contains(s),
            NameMatch::Not(inner) => !inner.matches(name),
            NameMatch::All(all) => all.iter().all(|m| m.matches(name)),
            NameMatch::Any(any) => any.iter().any(|m| m.matches(name)),
        }
    }

    pub fn not(self) -> Self {
        NameMatch::Not(Box::new(self))
    }
}

/// Extra axes after the row axis
#[derive(Debug, Clone)]
pub enum Axes {
    Fixed(Vec<&'static str>),
    /// Axis names computed from the column name
    Derived(fn(&str) -> Vec<String>),
}

impl Axes {
    fn resolve(&self, column: &str) -> Vec<String> {
        match self {
            Axes::Fixed(axes) => axes.iter().map(|a| a.to_string()).collect(),
            Axes::Derived(f) => f(column),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DimRule {
    pub matcher: NameMatch,
    pub axes: Axes,
}

impl DimRule {
    pub fn new(matcher: NameMatch, axes: &[&'static str]) -> Self {
        Self {
            matcher,
            axes: Axes::Fixed(axes.to_vec()),
        }
    }

    pub fn derived(matcher: NameMatch, axes: fn(&str) -> Vec<String>) -> Self {
        Self {
            matcher,
            axes: Axes::Derived(axes),
        }
    }
}

/// Lift a row-invariant vector column into a shared coordinate
#[derive(Debug, Clone)]
pub struct PromotionRule {
    pub matcher: NameMatch,
    pub coord_name: fn(&str) -> String,
}

/// Prefix columns past a position unless they are exempt
#[derive(Debug, Clone)]
pub struct PositionalRename {
    /// Columns whose 0-based position exceeds this are renamed
    pub after_index: usize,
    pub prefix: &'static str,
    pub exempt: fn(&str) -> bool,
}

impl PositionalRename {
    fn apply(&self, index: usize, name: &str) -> Option<String> {
        (index > self.after_index && !(self.exempt)(name))
            .then(|| format!("{}{}", self.prefix, name))
    }
}

/// Complete labelling rules for one table kind
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub extname: &'static str,
    pub row_key: &'static str,
    pub promotions: Vec<PromotionRule>,
    pub static_coords: Vec<(&'static str, Vec<&'static str>)>,
    pub dim_rules: Vec<DimRule>,
    pub rename: Option<PositionalRename>,
}

impl RuleSet {
    pub fn new(extname: &'static str, row_key: &'static str) -> Self {
        Self {
            extname,
            row_key,
            promotions: Vec::new(),
            static_coords: Vec::new(),
            dim_rules: Vec::new(),
            rename: None,
        }
    }

    pub fn promote(mut self, matcher: NameMatch, coord_name: fn(&str) -> String) -> Self {
        self.promotions.push(PromotionRule {
            matcher,
            coord_name,
        });
        self
    }

    pub fn static_coord(mut self, name: &'static str, labels: &[&'static str]) -> Self {
        self.static_coords.push((name, labels.to_vec()));
        self
    }

    pub fn dim_rule(mut self, rule: DimRule) -> Self {
        self.dim_rules.push(rule);
        self
    }

    pub fn rename(mut self, rename: PositionalRename) -> Self {
        self.rename = Some(rename);
        self
    }

    /// Extra axes for a data column; empty when no rule matches
    pub fn axes_for(&self, column: &str) -> Vec<String> {
        self.dim_rules
            .iter()
            .find(|rule| rule.matcher.matches(column))
            .map(|rule| rule.axes.resolve(column))
            .unwrap_or_default()
    }

    /// Label a decoded table
    pub fn apply(&self, mut table: Table, path: &Path) -> Result<LabeledDataset> {
        let nrows = table.nrows;
        let mut ds = LabeledDataset::new();

        let key = table.take_column(self.row_key).ok_or_else(|| {
            CacheError::schema_invariant(path, self.row_key, "row key column is missing")
        })?;
        if !key.cell_shape.is_empty() {
            return Err(CacheError::schema_invariant(
                path,
                self.row_key,
                format!("row key must be scalar, found cells of {:?}", key.cell_shape),
            ));
        }
        ds.set_coord(
            self.row_key,
            Variable::vector(self.row_key, key.data).with_unit(unit_label(&key.unit)),
        );

        let mut data_columns = Vec::with_capacity(table.columns.len());
        for column in table.columns {
            match self.promotions.iter().find(|p| p.matcher.matches(&column.name)) {
                Some(rule) => {
                    let coord_name = (rule.coord_name)(&column.name);
                    let values = shared_coordinate(&column, nrows, path)?;
                    debug!(
                        "Promoted {} to coordinate {} ({} values)",
                        column.name,
                        coord_name,
                        values.len()
                    );
                    ds.set_coord(
                        coord_name.clone(),
                        Variable::vector(coord_name, values)
                            .with_unit(unit_label(&column.unit)),
                    );
                }
                None => data_columns.push(column),
            }
        }

        for (name, labels) in &self.static_coords {
            let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
            ds.set_coord(*name, Variable::vector(*name, ArrayData::Str(labels)));
        }

        for (index, column) in data_columns.into_iter().enumerate() {
            let axes = self.axes_for(&column.name);
            if axes.len() != column.cell_shape.len() {
                return Err(CacheError::schema_invariant(
                    path,
                    &column.name,
                    format!(
                        "cells of shape {:?} do not fit extra dimensions {:?}",
                        column.cell_shape, axes
                    ),
                ));
            }

            let mut dims = Vec::with_capacity(axes.len() + 1);
            dims.push(self.row_key.to_string());
            dims.extend(axes);

            let name = self
                .rename
                .as_ref()
                .and_then(|r| r.apply(index, &column.name))
                .unwrap_or_else(|| column.name.clone());
            let unit = unit_label(&column.unit);
            let shape = column.shape(nrows);

            ds.set_data_var(name, Variable::new(dims, shape, column.data).with_unit(unit));
        }

        ds.validate()
            .map_err(|e| CacheError::schema_invariant(path, e.variable, e.reason))?;
        Ok(ds)
    }
}

/// Unit attribute text: the declared unit verbatim, else `"None"`
pub fn unit_label(unit: &Option<String>) -> String {
    unit.clone().unwrap_or_else(|| NO_UNIT.to_string())
}

/// Float element type a shared coordinate is averaged and rounded in
trait CoordValue: Copy + PartialEq + fmt::Display {
    fn mean(values: impl Iterator<Item = Self>, n: usize) -> Self;
    fn rounded(self, decimals: i32) -> Self;
}

impl CoordValue for f64 {
    fn mean(values: impl Iterator<Item = Self>, n: usize) -> Self {
        values.sum::<f64>() / n as f64
    }

    fn rounded(self, decimals: i32) -> Self {
        round_to(self, decimals)
    }
}

impl CoordValue for f32 {
    fn mean(values: impl Iterator<Item = Self>, n: usize) -> Self {
        (values.map(f64::from).sum::<f64>() / n as f64) as f32
    }

    fn rounded(self, decimals: i32) -> Self {
        let scale = 10f32.powi(decimals);
        (self * scale).round_ties_even() / scale
    }
}

/// Per-element mean across rows, rounded, after checking every row rounds
/// to the same value. Float columns keep their precision; integers widen to f64.
fn shared_coordinate(column: &Column, nrows: usize, path: &Path) -> Result<ArrayData> {
    if column.cell_shape.len() != 1 {
        return Err(CacheError::schema_invariant(
            path,
            &column.name,
            format!(
                "shared coordinate needs one vector per row, found cells of {:?}",
                column.cell_shape
            ),
        ));
    }
    let width = column.cell_shape[0];
    match &column.data {
        ArrayData::F32(values) => {
            shared_values(values, width, nrows, &column.name, path).map(ArrayData::F32)
        }
        data => {
            let values = data.to_f64().ok_or_else(|| {
                CacheError::schema_invariant(path, &column.name, "shared coordinate must be numeric")
            })?;
            shared_values(&values, width, nrows, &column.name, path).map(ArrayData::F64)
        }
    }
}

fn shared_values<T: CoordValue>(
    values: &[T],
    width: usize,
    nrows: usize,
    name: &str,
    path: &Path,
) -> Result<Vec<T>> {
    let mut shared = Vec::with_capacity(width);
    for k in 0..width {
        let column = (0..nrows).map(|row| values[row * width + k]);
        let mean = T::mean(column.clone(), nrows).rounded(COORD_ROUND_DECIMALS);

        for (row, value) in column.enumerate() {
            let value = value.rounded(COORD_ROUND_DECIMALS);
            if value != mean {
                return Err(CacheError::schema_invariant(
                    path,
                    name,
                    format!(
                        "row {row} element {k} is {value} but the shared value is {mean} \
                         at {COORD_ROUND_DECIMALS} decimals"
                    ),
                ));
            }
        }
        shared.push(mean);
    }
    Ok(shared)
}
