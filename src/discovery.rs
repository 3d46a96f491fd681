//! Locating WEAVE source files in the survey tree.
//!
//! Files follow `<root>/<level>/<date>/<filetype>_*<runid>*.fits`. Every
//! field of a [`SourceQuery`] is a glob pattern, `*` by default. Matches are
//! returned in lexicographic order and filtered on the primary header
//! `RES-OBS` keyword.

use crate::constants::{LOW_RESOLUTION_MARKER, RESOLUTION_KEYWORD, SOURCE_EXTENSION};
use crate::error::{CacheError, Result};
use crate::fits;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Spectrograph resolution mode selected by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Low,
    High,
    /// No header check
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub level: String,
    pub filetype: String,
    /// Observing night as `yyyymmdd`, or a pattern
    pub date: String,
    pub runid: String,
    pub resolution: Resolution,
}

impl Default for SourceQuery {
    fn default() -> Self {
        Self {
            level: "*".to_string(),
            filetype: "*".to_string(),
            date: "*".to_string(),
            runid: "*".to_string(),
            resolution: Resolution::Low,
        }
    }
}

impl SourceQuery {
    /// Low-resolution L2 stack files
    pub fn lr_l2_stack() -> Self {
        Self {
            level: "L2".to_string(),
            filetype: "stack".to_string(),
            ..Self::default()
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_runid(mut self, runid: impl Into<String>) -> Self {
        self.runid = runid.into();
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Glob pattern below `root`
    pub fn pattern(&self, root: &Path) -> String {
        root.join(&self.level)
            .join(&self.date)
            .join(format!(
                "{}_*{}*.{}",
                self.filetype, self.runid, SOURCE_EXTENSION
            ))
            .to_string_lossy()
            .into_owned()
    }

    /// Reject literal dates that are not a calendar `yyyymmdd`
    fn validate(&self) -> Result<()> {
        let literal = !self.date.contains(['*', '?', '[']);
        if literal && NaiveDate::parse_from_str(&self.date, "%Y%m%d").is_err() {
            return Err(CacheError::Discovery {
                pattern: self.date.clone(),
                reason: "date must be yyyymmdd".to_string(),
            });
        }
        Ok(())
    }
}

/// Whether a source's primary header marks it as low resolution
pub fn is_low_resolution(path: &Path) -> Result<bool> {
    let value = fits::read_header_keyword(path, RESOLUTION_KEYWORD)
        .map_err(|e| CacheError::source_read(path, "PRIMARY", e.to_string()))?;
    match value.as_ref().and_then(|v| v.as_str()) {
        Some(mode) => Ok(mode.contains(LOW_RESOLUTION_MARKER)),
        None => Err(CacheError::source_read(
            path,
            "PRIMARY",
            format!("no {RESOLUTION_KEYWORD} keyword"),
        )),
    }
}

/// Sorted source files under `root` matching `query`
pub fn list_source_files(root: &Path, query: &SourceQuery) -> Result<Vec<PathBuf>> {
    query.validate()?;
    let pattern = query.pattern(root);

    let entries = glob::glob(&pattern).map_err(|e| CacheError::Discovery {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CacheError::Discovery {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let matched = files.len();
    let files = match query.resolution {
        Resolution::Any => files,
        Resolution::Low | Resolution::High => {
            let want_low = query.resolution == Resolution::Low;
            let mut kept = Vec::with_capacity(files.len());
            for path in files {
                if is_low_resolution(&path)? == want_low {
                    kept.push(path);
                }
            }
            kept
        }
    };

    debug!(
        "{} of {} files matching {} kept for {:?} resolution",
        files.len(),
        matched,
        pattern,
        query.resolution
    );
    Ok(files)
}

/// Low-resolution L2 stack files for a night and run pattern
pub fn lr_l2_stack_files(root: &Path, date: &str, runid: &str) -> Result<Vec<PathBuf>> {
    list_source_files(
        root,
        &SourceQuery::lr_l2_stack().with_date(date).with_runid(runid),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ArrayData;
    use crate::fits::testing::{FitsBuilder, TestColumn};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, level: &str, date: &str, name: &str, res: &str) -> PathBuf {
        let dir = root.join(level).join(date);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        FitsBuilder::new()
            .primary_keyword("RES-OBS", res)
            .table(
                "STAR_SPEC",
                vec![TestColumn::new("APS_ID", ArrayData::I32(vec![1]))],
            )
            .write(&path)
            .unwrap();
        path
    }

    fn survey() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "L2", "20230101", "stack_1002.fits", "LR");
        write(root, "L2", "20230101", "stack_1001.fits", "LR");
        write(root, "L2", "20230101", "stack_2001.fits", "HR");
        write(root, "L2", "20230102", "stack_1003.fits", "LR");
        write(root, "L2", "20230102", "single_1004.fits", "LR");
        write(root, "L1", "20230101", "stack_1005.fits", "LR");
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_lr_l2_stack_files_sorted() {
        let dir = survey();
        let files = lr_l2_stack_files(dir.path(), "*", "*").unwrap();
        assert_eq!(
            names(&files),
            vec!["stack_1001.fits", "stack_1002.fits", "stack_1003.fits"]
        );
    }

    #[test]
    fn test_filters_by_date_and_runid() {
        let dir = survey();
        let files = lr_l2_stack_files(dir.path(), "20230101", "1002").unwrap();
        assert_eq!(names(&files), vec!["stack_1002.fits"]);
    }

    #[test]
    fn test_high_and_any_resolution() {
        let dir = survey();
        let query = SourceQuery::lr_l2_stack()
            .with_date("20230101")
            .with_resolution(Resolution::High);
        assert_eq!(
            names(&list_source_files(dir.path(), &query).unwrap()),
            vec!["stack_2001.fits"]
        );

        let query = SourceQuery::default().with_resolution(Resolution::Any);
        assert_eq!(list_source_files(dir.path(), &query).unwrap().len(), 6);
    }

    #[test]
    fn test_invalid_literal_date() {
        let dir = survey();
        let err = lr_l2_stack_files(dir.path(), "2023-01-01", "*").unwrap_err();
        assert!(matches!(err, CacheError::Discovery { .. }));
    }

    #[test]
    fn test_no_matches_is_empty() {
        let dir = survey();
        assert!(lr_l2_stack_files(dir.path(), "20240101", "*").unwrap().is_empty());
    }

    #[test]
    fn test_missing_resolution_keyword() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack_1.fits");
        FitsBuilder::new().write(&path).unwrap();
        assert!(matches!(
            is_low_resolution(&path).unwrap_err(),
            CacheError::SourceRead { .. }
        ));
    }
}
