//! Result types shared by the cache, its batch drivers and the CLI.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What `ensure_cached` did for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// An artifact already existed and was returned untouched
    Hit(PathBuf),
    /// The source was read and a new artifact written
    Converted(PathBuf),
}

impl CacheOutcome {
    pub fn path(&self) -> &Path {
        match self {
            CacheOutcome::Hit(p) | CacheOutcome::Converted(p) => p,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            CacheOutcome::Hit(p) | CacheOutcome::Converted(p) => p,
        }
    }

    pub fn was_converted(&self) -> bool {
        matches!(self, CacheOutcome::Converted(_))
    }
}

/// One source file that could not be cached
#[derive(Debug)]
pub struct FileFailure {
    pub source: PathBuf,
    pub error: CacheError,
}

/// Outcome of a skip-and-collect batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful outcomes in input order
    pub outcomes: Vec<CacheOutcome>,
    /// Failures in input order
    pub failures: Vec<FileFailure>,
    pub elapsed_ms: u128,
}

impl BatchReport {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.outcomes.iter().map(|o| o.path().to_path_buf()).collect()
    }

    pub fn converted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.was_converted()).count()
    }

    pub fn hits(&self) -> usize {
        self.outcomes.len() - self.converted()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Artifacts of one table found under the cache root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub artifacts: usize,
    pub bytes: u64,
}

/// Inventory of a cache root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub root: PathBuf,
    pub tables: BTreeMap<String, TableSummary>,
    /// Artifacts whose name matches no known table
    pub unrecognised: usize,
    /// Temporaries left behind by interrupted writes
    pub partial_files: Vec<PathBuf>,
    pub total_bytes: u64,
}

impl CacheSummary {
    pub fn artifact_count(&self) -> usize {
        self.tables.values().map(|t| t.artifacts).sum::<usize>() + self.unrecognised
    }
}
