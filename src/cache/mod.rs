//! Conversion cache.
//!
//! Maps a (reader, source file) pair to a canonical artifact path under the
//! cache root and converts the source only when nothing exists there. The
//! existence of a file at the canonical path is the whole cache protocol: no
//! timestamps or hashes are consulted, so a changed source is picked up only
//! after its artifact is deleted.

pub mod scan;

#[cfg(test)]
pub mod tests;

pub use scan::scan_cache;

use crate::artifact::write_artifact;
use crate::combine::CombinedDataset;
use crate::config::CacheConfig;
use crate::constants::{
    ARTIFACT_EXTENSION, FILENAME_DIM, MIRRORED_PATH_COMPONENTS, SOURCE_ATTR, TABLE_ATTR,
};
use crate::error::{CacheError, Result};
use crate::models::{BatchReport, CacheOutcome, FileFailure};
use crate::progress::ProgressObserver;
use crate::readers::TableReader;
use futures::stream::{self, StreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task;
use tracing::{debug, info, warn};

/// Canonical artifact path for `source` read as `table` under `root`.
///
/// The last three components of the lexically normalised source path are
/// mirrored below the root; the extension is replaced by `_<table>.nc`.
pub fn canonical_path(root: &Path, table: &str, source: &Path) -> PathBuf {
    let components = normalized_components(source);
    let start = components.len().saturating_sub(MIRRORED_PATH_COMPONENTS);
    let mirrored = &components[start..];

    let mut path = root.to_path_buf();
    if let Some((basename, dirs)) = mirrored.split_last() {
        path.extend(dirs);
        let stem = Path::new(basename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| basename.clone());
        path.push(format!("{stem}_{table}.{ARTIFACT_EXTENSION}"));
    }
    path
}

/// Normal components after resolving `.` and `..` without touching disk.
/// A `..` that would climb above the start is dropped.
fn normalized_components(path: &Path) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts
}

/// Base name without extension, used as the `filename` label
pub fn source_label(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ConversionCache {
    config: CacheConfig,
}

impl ConversionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.cache_root
    }

    pub fn canonical_path(&self, reader: &dyn TableReader, source: &Path) -> PathBuf {
        canonical_path(self.root(), &reader.table_name(), source)
    }

    pub fn is_cached(&self, reader: &dyn TableReader, source: &Path) -> bool {
        self.canonical_path(reader, source).exists()
    }

    /// Path of the artifact for `source`, converting it first if needed
    pub fn ensure_cached(&self, reader: &dyn TableReader, source: &Path) -> Result<PathBuf> {
        self.ensure_cached_outcome(reader, source)
            .map(CacheOutcome::into_path)
    }

    /// As [`ensure_cached`](Self::ensure_cached), reporting whether a
    /// conversion happened
    pub fn ensure_cached_outcome(
        &self,
        reader: &dyn TableReader,
        source: &Path,
    ) -> Result<CacheOutcome> {
        let cache_path = self.canonical_path(reader, source);
        if cache_path.exists() {
            debug!("Cache hit: {}", cache_path.display());
            return Ok(CacheOutcome::Hit(cache_path));
        }

        let table = reader.table_name();
        let mut ds = reader
            .read(source)?
            .expand_dims(FILENAME_DIM, source_label(source));
        ds.attrs.insert(TABLE_ATTR.to_string(), table);
        ds.attrs
            .insert(SOURCE_ATTR.to_string(), source.display().to_string());

        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CacheWrite {
                path: cache_path.clone(),
                source,
            })?;
        }
        write_artifact(&ds, &cache_path)?;

        info!(
            "Converted {} -> {}",
            source.display(),
            cache_path.display()
        );
        Ok(CacheOutcome::Converted(cache_path))
    }

    /// Convert many files with bounded parallelism, returning artifact paths
    /// in input order. Stops at the first failure in input order; conversions
    /// already running are finished before the error is returned and files
    /// not yet started are skipped.
    pub async fn ensure_cached_many(
        &self,
        reader: Arc<dyn TableReader>,
        sources: &[PathBuf],
        progress: &dyn ProgressObserver,
    ) -> Result<Vec<PathBuf>> {
        let start = Instant::now();
        progress.start(sources.len());

        let stop = Arc::new(AtomicBool::new(false));
        let mut results = std::pin::pin!(self.conversions(reader, sources, Arc::clone(&stop)));
        let mut paths = Vec::with_capacity(sources.len());
        let mut converted = 0;

        while let Some((source, result)) = results.next().await {
            let Some(result) = result else { continue };
            match result {
                Ok(outcome) => {
                    converted += usize::from(outcome.was_converted());
                    paths.push(outcome.into_path());
                    progress.advance(paths.len(), &source);
                }
                Err(e) => {
                    stop.store(true, Ordering::Relaxed);
                    warn!("Stopping batch at {}: {}", source.display(), e);
                    let in_flight = results.filter_map(|(_, r)| async move { r }).count().await;
                    debug!("{} in-flight conversions finished after the failure", in_flight);
                    progress.finish(paths.len());
                    return Err(e);
                }
            }
        }

        progress.finish(paths.len());
        info!(
            "{} artifacts ready ({} converted, {} cached) in {:.2} s",
            paths.len(),
            converted,
            paths.len() - converted,
            start.elapsed().as_secs_f64()
        );
        Ok(paths)
    }

    /// Convert every file, collecting failures instead of stopping
    pub async fn ensure_cached_collect(
        &self,
        reader: Arc<dyn TableReader>,
        sources: &[PathBuf],
        progress: &dyn ProgressObserver,
    ) -> BatchReport {
        let start = Instant::now();
        progress.start(sources.len());

        let stop = Arc::new(AtomicBool::new(false));
        let mut results = std::pin::pin!(self.conversions(reader, sources, stop));
        let mut report = BatchReport::default();
        let mut done = 0;

        while let Some((source, result)) = results.next().await {
            let Some(result) = result else { continue };
            done += 1;
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(error) => {
                    warn!("Skipping {}: {}", source.display(), error);
                    report.failures.push(FileFailure { source: source.clone(), error });
                }
            }
            progress.advance(done, &source);
        }

        progress.finish(done);
        report.elapsed_ms = start.elapsed().as_millis();
        info!(
            "{} artifacts ready, {} failed",
            report.outcomes.len(),
            report.failures.len()
        );
        report
    }

    /// Convert where necessary, then open everything as one dataset
    pub async fn load(
        &self,
        reader: Arc<dyn TableReader>,
        sources: &[PathBuf],
        progress: &dyn ProgressObserver,
    ) -> Result<CombinedDataset> {
        let paths = self.ensure_cached_many(reader, sources, progress).await?;
        CombinedDataset::open(&paths, self.config.max_concurrent_files).await
    }

    /// Ordered stream of per-file outcomes, converting on the blocking pool
    /// Conversion results in input order; `None` for files skipped once
    /// `stop` is set
    fn conversions(
        &self,
        reader: Arc<dyn TableReader>,
        sources: &[PathBuf],
        stop: Arc<AtomicBool>,
    ) -> impl futures::Stream<Item = (PathBuf, Option<Result<CacheOutcome>>)> + '_ {
        let max_concurrent = self.config.max_concurrent_files.max(1);
        stream::iter(sources.to_vec())
            .map(move |source| {
                let cache = self.clone();
                let reader = Arc::clone(&reader);
                let stop = Arc::clone(&stop);
                async move {
                    if stop.load(Ordering::Relaxed) {
                        return (source, None);
                    }
                    let task_source = source.clone();
                    let result = task::spawn_blocking(move || {
                        cache.ensure_cached_outcome(reader.as_ref(), &task_source)
                    })
                    .await
                    .unwrap_or_else(|e| Err(CacheError::Io(std::io::Error::other(e))));
                    (source, Some(result))
                }
            })
            .buffered(max_concurrent)
    }
}
