//! Cache inventory.

use crate::constants::{ARTIFACT_EXTENSION, PARTIAL_SUFFIX};
use crate::error::{CacheError, Result};
use crate::models::CacheSummary;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Walk `root` and count artifacts per table.
///
/// Artifact names end in `_<table>.nc`; `tables` lists the table names to
/// recognise, longest match first. A missing root is an empty cache.
pub fn scan_cache(root: &Path, tables: &[String]) -> Result<CacheSummary> {
    let mut summary = CacheSummary {
        root: root.to_path_buf(),
        ..CacheSummary::default()
    };
    if !root.exists() {
        debug!("Cache root {} does not exist yet", root.display());
        return Ok(summary);
    }

    let mut tables: Vec<&String> = tables.iter().collect();
    tables.sort_by_key(|t| std::cmp::Reverse(t.len()));

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            CacheError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.ends_with(PARTIAL_SUFFIX) {
            summary.partial_files.push(entry.path().to_path_buf());
            continue;
        }

        let Some(stem) = name.strip_suffix(&format!(".{ARTIFACT_EXTENSION}")) else {
            continue;
        };
        let bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        summary.total_bytes += bytes;

        match tables
            .iter()
            .find(|table| stem.ends_with(&format!("_{table}")))
        {
            Some(table) => {
                let slot = summary.tables.entry(table.to_string()).or_default();
                slot.artifacts += 1;
                slot.bytes += bytes;
            }
            None => summary.unrecognised += 1,
        }
    }

    Ok(summary)
}
