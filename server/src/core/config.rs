use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_GROUPS_LIMIT, DEFAULT_HOST, DEFAULT_MAX_POINTS,
    DEFAULT_MIN_BUCKET_SECS, DEFAULT_POINT_BUDGET, DEFAULT_PORT, DEFAULT_ROLLUP_INTERVAL_SECS,
    DEFAULT_SPANS_PAGE_LIMIT, SPANS_MAX_PAGE_LIMIT,
};

// =============================================================================
// File Config Structs (raw JSON sections, every field optional)
// =============================================================================

/// Server configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Query configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    pub point_budget: Option<usize>,
    pub max_points: Option<usize>,
    pub min_bucket_secs: Option<u64>,
    pub page_limit: Option<u64>,
    pub groups_limit: Option<u64>,
    pub fast_groups: Option<bool>,
    pub rollup_interval_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub query: Option<QueryFileConfig>,
    pub data_dir: Option<String>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            macro_rules! merge_field {
                ($($field:ident),*) => {$(
                    if query.$field.is_some() {
                        tracing::trace!(field = stringify!($field), "Merging query field");
                        current.$field = query.$field;
                    }
                )*};
            }
            merge_field!(
                point_budget,
                max_points,
                min_bucket_secs,
                page_limit,
                groups_limit,
                fast_groups,
                rollup_interval_secs
            );
        }

        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Span query tuning
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// Target points per time series
    pub point_budget: usize,
    /// Hard cap on points per time series
    pub max_points: usize,
    /// Smallest bucket width
    pub min_bucket_secs: u64,
    /// Default span page size
    pub page_limit: u64,
    /// Maximum rows from the groups endpoint
    pub groups_limit: u64,
    /// Try the per-minute rollup before raw spans for groups
    pub fast_groups: bool,
    /// Rollup refresh interval
    pub rollup_interval_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            point_budget: DEFAULT_POINT_BUDGET,
            max_points: DEFAULT_MAX_POINTS,
            min_bucket_secs: DEFAULT_MIN_BUCKET_SECS,
            page_limit: DEFAULT_SPANS_PAGE_LIMIT,
            groups_limit: DEFAULT_GROUPS_LIMIT,
            fast_groups: true,
            rollup_interval_secs: DEFAULT_ROLLUP_INTERVAL_SECS,
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub query: QueryConfig,
    /// Explicit data directory; the platform default applies when unset
    pub data_dir: Option<PathBuf>,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.spanlens/spanlens.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::from_layers(cli, file_config)
    }

    /// Layer defaults, file config and CLI/env overrides, then validate
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_query = file_config.query.unwrap_or_default();
        let defaults = QueryConfig::default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let query = QueryConfig {
            point_budget: file_query.point_budget.unwrap_or(defaults.point_budget),
            max_points: file_query.max_points.unwrap_or(defaults.max_points),
            min_bucket_secs: file_query
                .min_bucket_secs
                .unwrap_or(defaults.min_bucket_secs),
            page_limit: file_query.page_limit.unwrap_or(defaults.page_limit),
            groups_limit: file_query.groups_limit.unwrap_or(defaults.groups_limit),
            fast_groups: cli
                .fast_groups
                .or(file_query.fast_groups)
                .unwrap_or(defaults.fast_groups),
            rollup_interval_secs: cli
                .rollup_interval_secs
                .or(file_query.rollup_interval_secs)
                .unwrap_or(defaults.rollup_interval_secs),
        };

        let data_dir = cli
            .data_dir
            .as_ref()
            .map(|p| expand_path(&p.to_string_lossy()))
            .or_else(|| file_config.data_dir.as_deref().map(expand_path));

        // debug: CLI/env flag takes precedence, then file config, default false
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let config = Self {
            server: ServerConfig { host, port },
            query,
            data_dir,
            debug,
        };
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            point_budget = config.query.point_budget,
            fast_groups = config.query.fast_groups,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        let q = &self.query;
        if q.point_budget == 0 || q.max_points == 0 {
            anyhow::bail!(
                "Configuration error: query.point_budget and query.max_points must be greater than 0"
            );
        }
        if q.point_budget > q.max_points {
            anyhow::bail!(
                "Configuration error: query.point_budget ({}) must not exceed query.max_points ({})",
                q.point_budget,
                q.max_points
            );
        }
        if q.min_bucket_secs == 0 {
            anyhow::bail!("Configuration error: query.min_bucket_secs must be greater than 0");
        }
        if q.page_limit == 0 || q.page_limit > SPANS_MAX_PAGE_LIMIT {
            anyhow::bail!(
                "Configuration error: query.page_limit must be between 1 and {}",
                SPANS_MAX_PAGE_LIMIT
            );
        }
        if q.groups_limit == 0 {
            anyhow::bail!("Configuration error: query.groups_limit must be greater than 0");
        }
        if q.rollup_interval_secs == 0 {
            anyhow::bail!("Configuration error: query.rollup_interval_secs must be greater than 0");
        }

        if is_all_interfaces(&self.server.host) {
            tracing::warn!(
                host = %self.server.host,
                "Server binds to all interfaces and has no authentication"
            );
        }
        Ok(())
    }
}

fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub(crate) fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> FileConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_file_config_parse_full() {
        let config = parse(
            r#"{
                "server": { "host": "0.0.0.0", "port": 8080 },
                "query": { "point_budget": 120, "fast_groups": false },
                "debug": true
            }"#,
        );
        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(server.port, Some(8080));
        let query = config.query.as_ref().unwrap();
        assert_eq!(query.point_budget, Some(120));
        assert_eq!(query.fast_groups, Some(false));
        assert!(query.max_points.is_none());
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_file_config_parse_empty() {
        let config = parse("{}");
        assert!(config.server.is_none());
        assert!(config.query.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let config = parse(r#"{ "server": { "host": "localhost" }, "unknown_field": 123 }"#);
        assert_eq!(config.extra.get("unknown_field").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = parse(
            r#"{ "server": { "host": "base", "port": 1000 }, "query": { "point_budget": 100, "groups_limit": 50 } }"#,
        );
        base.merge(parse(
            r#"{ "server": { "port": 2000 }, "query": { "point_budget": 200 }, "debug": true }"#,
        ));

        let server = base.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("base"));
        assert_eq!(server.port, Some(2000));
        let query = base.query.as_ref().unwrap();
        assert_eq!(query.point_budget, Some(200));
        assert_eq!(query.groups_limit, Some(50));
        assert_eq!(base.debug, Some(true));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_layers(&CliConfig::default(), FileConfig::default()).unwrap();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.query, QueryConfig::default());
        assert!(!config.debug);
    }

    #[test]
    fn test_app_config_cli_override() {
        let cli = CliConfig {
            host: Some("cli.host".to_string()),
            port: Some(3000),
            debug: true,
            config: None,
            data_dir: None,
            rollup_interval_secs: Some(5),
            fast_groups: Some(false),
        };
        let file = parse(r#"{ "server": { "port": 9000 }, "query": { "fast_groups": true, "rollup_interval_secs": 600 } }"#);
        let config = AppConfig::from_layers(&cli, file).unwrap();
        assert_eq!(config.server.host, "cli.host");
        assert_eq!(config.server.port, 3000);
        assert!(config.debug);
        assert!(!config.query.fast_groups);
        assert_eq!(config.query.rollup_interval_secs, 5);
    }

    #[test]
    fn test_app_config_data_dir_precedence() {
        let file = || parse(r#"{ "data_dir": "/from/file" }"#);

        let config = AppConfig::from_layers(&CliConfig::default(), file()).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/from/file")));

        let cli = CliConfig {
            data_dir: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, file()).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/from/cli")));

        let config =
            AppConfig::from_layers(&CliConfig::default(), FileConfig::default()).unwrap();
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_app_config_file_values() {
        let file = parse(r#"{ "query": { "point_budget": 60, "max_points": 500, "page_limit": 25 } }"#);
        let config = AppConfig::from_layers(&CliConfig::default(), file).unwrap();
        assert_eq!(config.query.point_budget, 60);
        assert_eq!(config.query.max_points, 500);
        assert_eq!(config.query.page_limit, 25);
    }

    #[test]
    fn test_app_config_validation_empty_host() {
        let cli = CliConfig {
            host: Some(String::new()),
            ..Default::default()
        };
        let err = AppConfig::from_layers(&cli, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("server.host must not be empty"));
    }

    #[test]
    fn test_app_config_validation_server_port_zero() {
        let cli = CliConfig {
            port: Some(0),
            ..Default::default()
        };
        let err = AppConfig::from_layers(&cli, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_app_config_validation_budget_exceeds_cap() {
        let file = parse(r#"{ "query": { "point_budget": 500, "max_points": 100 } }"#);
        let err = AppConfig::from_layers(&CliConfig::default(), file).unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_app_config_validation_zero_values() {
        for json in [
            r#"{ "query": { "point_budget": 0 } }"#,
            r#"{ "query": { "min_bucket_secs": 0 } }"#,
            r#"{ "query": { "page_limit": 0 } }"#,
            r#"{ "query": { "page_limit": 101 } }"#,
            r#"{ "query": { "groups_limit": 0 } }"#,
            r#"{ "query": { "rollup_interval_secs": 0 } }"#,
        ] {
            assert!(
                AppConfig::from_layers(&CliConfig::default(), parse(json)).is_err(),
                "{} should be rejected",
                json
            );
        }
    }

    #[test]
    fn test_load_missing_config_path() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/spanlens.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_explicit_config_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{ "server": { "port": 7777 } }"#).unwrap();
        let cli = CliConfig {
            config: Some(path),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 7777);
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}
