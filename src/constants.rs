//! Application constants for the WEAVE netCDF cache
//!
//! Environment variable names, default locations, naming conventions and
//! numeric tolerances shared across readers, cache and combiner.

// =============================================================================
// Environment and default locations
// =============================================================================

/// Environment variable overriding the cache root
pub const CACHE_ROOT_ENV: &str = "NETCDF_STORE";

/// Folder name under the user's home used when no cache root is configured
pub const DEFAULT_CACHE_DIR_NAME: &str = "netcdf_store";

/// Environment variable pointing at the root of the WEAVE file tree
pub const SURVEY_ROOT_ENV: &str = "WEAVEIO_ROOTDIR";

// =============================================================================
// Cache naming
// =============================================================================

/// Extension of cached artifacts
pub const ARTIFACT_EXTENSION: &str = "nc";

/// Number of trailing source path components mirrored under the cache root
pub const MIRRORED_PATH_COMPONENTS: usize = 3;

/// Prefix stripped from a reader name to obtain its table name
pub const READER_NAME_PREFIX: &str = "read_";

/// Suffix of the temporary file an artifact is written to before rename
pub const PARTIAL_SUFFIX: &str = ".partial";

// =============================================================================
// Dataset labelling
// =============================================================================

/// Per-file identifier dimension added to every artifact
pub const FILENAME_DIM: &str = "filename";

/// Row key column of every WEAVE L2 table
pub const ROW_KEY: &str = "APS_ID";

/// Unit attribute name on every data variable
pub const UNIT_ATTR: &str = "unit";

/// Text stored when a column has no physical unit
pub const NO_UNIT: &str = "None";

/// Decimal places a shared coordinate must agree to across rows
pub const COORD_ROUND_DECIMALS: i32 = 3;

/// Global attribute naming the table an artifact holds
pub const TABLE_ATTR: &str = "table";

/// Global attribute holding the source file path
pub const SOURCE_ATTR: &str = "source";

// =============================================================================
// File discovery
// =============================================================================

/// Extension of WEAVE source files
pub const SOURCE_EXTENSION: &str = "fits";

/// Primary header keyword carrying the observing resolution
pub const RESOLUTION_KEYWORD: &str = "RES-OBS";

/// Marker in the resolution keyword identifying low-resolution data
pub const LOW_RESOLUTION_MARKER: &str = "LR";

// =============================================================================
// Concurrency
// =============================================================================

/// Upper bound on concurrently converted or scanned files
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 8;
