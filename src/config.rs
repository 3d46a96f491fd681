//! Configuration management.
//!
//! Cache and discovery locations are resolved once, at startup, into plain
//! values that are then threaded through every operation. The fallback chain
//! itself is a pure function so it can be tested without touching the
//! process environment.

use crate::constants::{
    CACHE_ROOT_ENV, DEFAULT_CACHE_DIR_NAME, DEFAULT_MAX_CONCURRENT_FILES, SURVEY_ROOT_ENV,
};
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve the cache root: explicit value, then environment value, then
/// `<home>/netcdf_store`.
pub fn resolve_cache_root(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Ok(PathBuf::from(value));
    }

    home.map(|h| h.join(DEFAULT_CACHE_DIR_NAME))
        .ok_or_else(|| CacheError::Configuration {
            message: format!(
                "No cache root given, {} is unset and the home directory is unknown",
                CACHE_ROOT_ENV
            ),
        })
}

/// Settings for the conversion cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Folder holding the cached netCDF artifacts
    pub cache_root: PathBuf,

    /// Display a progress bar during batch conversion
    pub progress: bool,

    /// Maximum files converted or scanned at once
    pub max_concurrent_files: usize,
}

impl CacheConfig {
    /// Create a configuration for an explicit cache root
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            progress: true,
            max_concurrent_files: default_concurrency(),
        }
    }

    /// Resolve the cache root from `NETCDF_STORE` or the home directory
    pub fn from_env() -> Result<Self> {
        Self::resolve(None)
    }

    /// Resolve the cache root, preferring `explicit` when given
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env_value = std::env::var(CACHE_ROOT_ENV).ok();
        let home = dirs::home_dir();
        let cache_root = resolve_cache_root(explicit, env_value.as_deref(), home.as_deref())?;
        debug!("Resolved cache root: {}", cache_root.display());
        Ok(Self::new(cache_root))
    }

    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Set maximum concurrent files (at least one)
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files.max(1);
        self
    }
}

impl Default for CacheConfig {
    /// `<home>/netcdf_store`, or a relative `netcdf_store` without a home
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        Self::new(home.join(DEFAULT_CACHE_DIR_NAME))
    }
}

/// Settings for locating WEAVE source files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Root of the `<level>/<date>/<filetype>_*<runid>*.fits` tree
    pub survey_root: PathBuf,
}

impl DiscoveryConfig {
    pub fn new(survey_root: impl Into<PathBuf>) -> Self {
        Self {
            survey_root: survey_root.into(),
        }
    }

    /// Resolve the survey root from an explicit value or `WEAVEIO_ROOTDIR`
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        std::env::var(SURVEY_ROOT_ENV)
            .map(Self::new)
            .map_err(|_| CacheError::Configuration {
                message: format!("{} is not set and no survey root was given", SURVEY_ROOT_ENV),
            })
    }
}

fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, DEFAULT_MAX_CONCURRENT_FILES)
}
