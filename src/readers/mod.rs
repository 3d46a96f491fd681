//! Source readers for WEAVE L2 tables.
//!
//! A reader turns one FITS file into one [`LabeledDataset`]. The six WEAVE
//! readers differ only in their labelling rules, so each is a [`RuleReader`]
//! over a [`RuleSet`]; the [`TableReader`] trait is the seam the conversion
//! cache depends on.

pub mod rules;

pub use rules::{Axes, DimRule, NameMatch, PositionalRename, PromotionRule, RuleSet, unit_label};

use crate::constants::{READER_NAME_PREFIX, ROW_KEY};
use crate::dataset::LabeledDataset;
use crate::error::{CacheError, Result};
use crate::fits;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Reads one table kind from a source file
pub trait TableReader: Send + Sync + fmt::Debug {
    /// Reader name, e.g. `read_class_table`
    fn name(&self) -> &str;

    /// Table name used in cache paths: the name without `read_`
    fn table_name(&self) -> String {
        self.name().replace(READER_NAME_PREFIX, "")
    }

    /// Must be deterministic: the same file always yields the same dataset
    fn read(&self, path: &Path) -> Result<LabeledDataset>;
}

/// A reader defined entirely by its labelling rules
#[derive(Debug, Clone)]
pub struct RuleReader {
    name: &'static str,
    rules: RuleSet,
}

impl RuleReader {
    pub fn new(name: &'static str, rules: RuleSet) -> Self {
        Self { name, rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl TableReader for RuleReader {
    fn name(&self) -> &str {
        self.name
    }

    fn read(&self, path: &Path) -> Result<LabeledDataset> {
        let extname = self.rules.extname;
        let table = fits::read_table(path, extname)
            .map_err(|e| CacheError::source_read(path, extname, e.to_string()))?;
        debug!(
            "{} read {} rows from {}",
            self.name,
            table.nrows,
            path.display()
        );
        self.rules.apply(table, path)
    }
}

/// `CLASS_TABLE`: redshift grids `CZZ_*` become coordinates indexing the
/// matching `CZZ_CHI2_*` columns; `COEFF` is indexed by `I_COEFF`.
pub fn class_table() -> RuleReader {
    let redshift_grid = NameMatch::All(vec![
        NameMatch::Prefix("CZZ"),
        NameMatch::Contains("CHI2").not(),
    ]);
    RuleReader::new(
        "read_class_table",
        RuleSet::new("CLASS_TABLE", ROW_KEY)
            .promote(redshift_grid, |c| c.to_string())
            .dim_rule(DimRule::derived(NameMatch::Prefix("CZZ"), |c| {
                vec![c.replace("_CHI2", "")]
            }))
            .dim_rule(DimRule::new(NameMatch::Exact("COEFF"), &["I_COEFF"])),
    )
}

pub const STELLAR_PARAMETERS: [&str; 5] = ["TEFF", "LOGG", "FEH", "ALPHA", "MICRO"];

/// `STAR_TABLE`: `COVAR` is a matrix over the stellar parameters; element
/// abundances are indexed by `I_ELEM`.
pub fn star_table() -> RuleReader {
    RuleReader::new(
        "read_star_table",
        RuleSet::new("STAR_TABLE", ROW_KEY)
            .static_coord("I_COVAR", &STELLAR_PARAMETERS)
            .static_coord("J_COVAR", &STELLAR_PARAMETERS)
            .dim_rule(DimRule::new(NameMatch::Exact("COVAR"), &["I_COVAR", "J_COVAR"]))
            .dim_rule(DimRule::new(NameMatch::Contains("ELEM"), &["I_ELEM"])),
    )
}

const LINE_PREFIXES: [&str; 7] = ["EBMV", "FLUX", "AMPL", "Z", "SIGMA", "AON", "FWHM"];

/// True for columns that are not emission-line measurements
pub fn not_line_col(name: &str) -> bool {
    let name = name.replace("ERR_", "");
    !LINE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(&format!("{prefix}_")))
}

/// `GALAXY_TABLE`: extinction columns carry `I_EBMV`; trailing non-line
/// columns are index columns and get an `IDX_` prefix.
pub fn galaxy_table() -> RuleReader {
    RuleReader::new(
        "read_galaxy_table",
        RuleSet::new("GALAXY_TABLE", ROW_KEY)
            .dim_rule(DimRule::new(NameMatch::Contains("EBMV"), &["I_EBMV"]))
            .rename(PositionalRename {
                after_index: 100,
                prefix: "IDX_",
                exempt: |c| !not_line_col(c),
            }),
    )
}

/// `CLASS_SPEC`: per-band wavelength columns become `LAMBDA_<band>`
pub fn class_spec() -> RuleReader {
    RuleReader::new(
        "read_class_spec",
        RuleSet::new("CLASS_SPEC", ROW_KEY)
            .promote(NameMatch::Prefix("LAMBDA"), |c| {
                format!("LAMBDA_{}", c.rsplit('_').next().unwrap_or(c))
            })
            .dim_rule(DimRule::new(NameMatch::Suffix("_B"), &["LAMBDA_B"]))
            .dim_rule(DimRule::new(NameMatch::Suffix("_R"), &["LAMBDA_R"])),
    )
}

/// `STAR_SPEC`: spectra on per-fibre wavelength bins
pub fn star_spec() -> RuleReader {
    RuleReader::new(
        "read_star_spec",
        RuleSet::new("STAR_SPEC", ROW_KEY)
            .dim_rule(DimRule::new(NameMatch::Suffix("_B"), &["LAMBIN_B"]))
            .dim_rule(DimRule::new(NameMatch::Suffix("_R"), &["LAMBIN_R"]))
            .dim_rule(DimRule::new(NameMatch::Suffix("_C"), &["LAMBIN_C"])),
    )
}

pub fn galaxy_spec() -> RuleReader {
    RuleReader::new(
        "read_galaxy_spec",
        RuleSet::new("GALAXY_SPEC", ROW_KEY).dim_rule(DimRule::new(
            NameMatch::Any(vec![NameMatch::Suffix("_PPXF"), NameMatch::Suffix("_GAND")]),
            &["LOGLAMBIN"],
        )),
    )
}

/// Readers addressable by name or table name
#[derive(Debug, Clone, Default)]
pub struct ReaderRegistry {
    readers: Vec<Arc<dyn TableReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All six WEAVE L2 readers
    pub fn weave_l2() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(class_table()));
        registry.register(Arc::new(star_table()));
        registry.register(Arc::new(galaxy_table()));
        registry.register(Arc::new(class_spec()));
        registry.register(Arc::new(star_spec()));
        registry.register(Arc::new(galaxy_spec()));
        registry
    }

    /// Add a reader, replacing one with the same name
    pub fn register(&mut self, reader: Arc<dyn TableReader>) {
        self.readers.retain(|r| r.name() != reader.name());
        self.readers.push(reader);
    }

    /// Look up `read_class_table` or `class_table`, ignoring case
    pub fn get(&self, name: &str) -> Result<Arc<dyn TableReader>> {
        self.readers
            .iter()
            .find(|r| {
                r.name().eq_ignore_ascii_case(name) || r.table_name().eq_ignore_ascii_case(name)
            })
            .cloned()
            .ok_or_else(|| CacheError::UnknownReader {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.readers.iter().map(|r| r.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TableReader>> {
        self.readers.iter()
    }
}

#[cfg(test)]
mod tests;
