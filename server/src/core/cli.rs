use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DATA_DIR, ENV_DEBUG, ENV_FAST_GROUPS, ENV_HOST, ENV_PORT,
    ENV_ROLLUP_INTERVAL_SECS,
};

#[derive(Parser)]
#[command(name = "spanlens")]
#[command(version, about = "Span query and aggregation server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (verbose request logging)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Data directory holding the DuckDB files
    #[arg(long, short = 'd', global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,

    /// Per-minute rollup refresh interval in seconds
    #[arg(long, global = true, env = ENV_ROLLUP_INTERVAL_SECS)]
    pub rollup_interval_secs: Option<u64>,

    /// Serve group listings from the per-minute rollup when possible
    #[arg(long, global = true, env = ENV_FAST_GROUPS)]
    pub fast_groups: Option<bool>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Rebuild the per-minute rollup and exit
    Rollup,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub rollup_interval_secs: Option<u64>,
    pub fast_groups: Option<bool>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        data_dir: cli.data_dir,
        rollup_interval_secs: cli.rollup_interval_secs,
        fast_groups: cli.fast_groups,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "spanlens",
            "--port",
            "6000",
            "--fast-groups",
            "false",
            "--rollup-interval-secs",
            "15",
            "rollup",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(6000));
        assert_eq!(cli.fast_groups, Some(false));
        assert_eq!(cli.rollup_interval_secs, Some(15));
        assert!(matches!(cli.command, Some(Commands::Rollup)));
    }

    #[test]
    fn test_parse_no_command() {
        let cli = Cli::try_parse_from(["spanlens", "-H", "0.0.0.0"]).unwrap();
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_data_dir_after_command() {
        let cli = Cli::try_parse_from(["spanlens", "start", "-d", "/srv/spans"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/spans")));
        assert!(matches!(cli.command, Some(Commands::Start)));
    }
}
