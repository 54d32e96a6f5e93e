// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Spanlens";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "spanlens";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".spanlens";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "spanlens.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SPANLENS_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "SPANLENS_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "SPANLENS_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "SPANLENS_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SPANLENS_LOG";

/// Environment variable selecting log output: `compact` (default) or `json`
pub const ENV_LOG_FORMAT: &str = "SPANLENS_LOG_FORMAT";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

/// Default request body limit (1MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "SPANLENS_DATA_DIR";

// =============================================================================
// DuckDB Database
// =============================================================================

/// DuckDB database filename
pub const DUCKDB_DB_FILENAME: &str = "spanlens.duckdb";

/// DuckDB checkpoint interval in seconds (5 minutes)
pub const DUCKDB_CHECKPOINT_INTERVAL_SECS: u64 = 300;

/// DuckDB API query timeout in seconds
pub const DUCKDB_QUERY_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Span Queries
// =============================================================================

/// Environment variable for the rollup refresh interval
pub const ENV_ROLLUP_INTERVAL_SECS: &str = "SPANLENS_ROLLUP_INTERVAL_SECS";

/// Environment variable to disable the rollup fast path for groups
pub const ENV_FAST_GROUPS: &str = "SPANLENS_FAST_GROUPS";

/// Maximum size of the `query` parameter in bytes (10KB)
pub const QUERY_MAX_PARTS_JSON_SIZE: usize = 10 * 1024;

/// Maximum number of parts in one query expression
pub const QUERY_MAX_PARTS: usize = 50;

/// Default page size for span listings
pub const DEFAULT_SPANS_PAGE_LIMIT: u64 = 10;

/// Maximum page size for span listings
pub const SPANS_MAX_PAGE_LIMIT: u64 = 100;

/// Maximum rows returned by the groups endpoint
pub const DEFAULT_GROUPS_LIMIT: u64 = 1000;

/// Target number of points per time series
pub const DEFAULT_POINT_BUDGET: usize = 300;

/// Hard cap on points per time series
pub const DEFAULT_MAX_POINTS: usize = 10_000;

/// Smallest bucket width in seconds
pub const DEFAULT_MIN_BUCKET_SECS: u64 = 60;

/// Per-minute rollup refresh interval in seconds
pub const DEFAULT_ROLLUP_INTERVAL_SECS: u64 = 60;

// =============================================================================
// Shutdown
// =============================================================================

/// Time allowed for background tasks to finish on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
