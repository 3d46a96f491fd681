//! Conversion cache tests
//!
//! Shared fixtures write small WEAVE-like stack files into a temporary
//! survey tree and point the cache at a separate temporary root.

pub mod ensure;

use crate::cache::ConversionCache;
use crate::config::CacheConfig;
use crate::dataset::{ArrayData, LabeledDataset};
use crate::error::Result;
use crate::fits::testing::{FitsBuilder, TestColumn};
use crate::readers::{self, RuleReader, TableReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Reader wrapper counting how often the source is actually read
#[derive(Debug)]
pub struct CountingReader {
    inner: RuleReader,
    calls: AtomicUsize,
}

impl CountingReader {
    pub fn new(inner: RuleReader) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TableReader for CountingReader {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&self, path: &Path) -> Result<LabeledDataset> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read(path)
    }
}

/// Write `<survey>/L2/<night>/<name>` with a STAR_SPEC table of `APS_ID` and
/// scalar `FLUX`
pub fn write_stack(survey: &Path, night: &str, name: &str, aps_id: Vec<i32>, flux: Vec<f32>) -> PathBuf {
    let dir = survey.join("L2").join(night);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    FitsBuilder::new()
        .primary_keyword("RES-OBS", "LR")
        .table(
            "STAR_SPEC",
            vec![
                TestColumn::new("APS_ID", ArrayData::I32(aps_id)),
                TestColumn::new("FLUX", ArrayData::F32(flux)).unit("erg/s/cm2/A"),
            ],
        )
        .write(&path)
        .unwrap();
    path
}

/// A file with no STAR_SPEC extension
pub fn write_broken(survey: &Path, night: &str, name: &str) -> PathBuf {
    let dir = survey.join("L2").join(night);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    FitsBuilder::new()
        .primary_keyword("RES-OBS", "LR")
        .write(&path)
        .unwrap();
    path
}

pub struct Fixture {
    pub survey: TempDir,
    pub store: TempDir,
    pub cache: ConversionCache,
}

impl Fixture {
    pub fn new() -> Self {
        let survey = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let cache = ConversionCache::new(
            CacheConfig::new(store.path())
                .with_progress(false)
                .with_max_concurrent_files(2),
        );
        Self {
            survey,
            store,
            cache,
        }
    }

    pub fn stack(&self, name: &str, seed: i32) -> PathBuf {
        write_stack(
            self.survey.path(),
            "20230101",
            name,
            vec![seed, seed + 1, seed + 2],
            vec![seed as f32 * 0.5, 1.25, -3.0],
        )
    }
}

pub fn star_spec() -> RuleReader {
    readers::star_spec()
}
