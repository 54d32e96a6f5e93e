//! Application wiring: configuration, storage, services and the command to run

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, ENV_LOG_FORMAT};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::{DuckdbService, SpanIndexRepository};
use crate::domain::spans::SpanQueryService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub analytics: Arc<DuckdbService>,
    pub spans: Arc<SpanQueryService>,
}

impl CoreApp {
    /// Parse the command line and run the selected command to completion
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        init_logging();

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config).await?;
        match command.unwrap_or(Commands::Start) {
            Commands::Start => app.serve().await,
            Commands::Rollup => app.rebuild_rollup().await,
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;

        let analytics = Arc::new(
            DuckdbService::init(&storage)
                .await
                .context("Failed to open the span database")?,
        );
        let repo: Arc<dyn SpanIndexRepository> = Arc::new(Arc::clone(&analytics));
        let spans = Arc::new(SpanQueryService::new(repo, config.query.clone()));

        Ok(Self {
            shutdown: ShutdownService::new(Arc::clone(&analytics)),
            config,
            storage,
            analytics,
            spans,
        })
    }

    /// `rollup` command: rebuild once, then close the store
    async fn rebuild_rollup(self) -> Result<()> {
        let result = self.analytics.refresh_rollup().await;
        self.shutdown.shutdown().await;
        let rows = result.context("Rollup refresh failed")?;
        println!("Rebuilt per-minute rollup: {} rows", rows);
        Ok(())
    }

    /// `start` command: serve until a signal arrives
    async fn serve(self) -> Result<()> {
        // Before anything that can block
        self.shutdown.install_signal_handlers();
        self.start_background_tasks().await;

        banner::print_banner(
            &self.config.server.host,
            self.config.server.port,
            &self.storage.data_dir().display().to_string(),
            self.config.query.fast_groups,
        );

        let app = ApiServer::new(self).start().await?;
        app.shutdown.shutdown().await;
        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        let checkpoint = self
            .analytics
            .start_checkpoint_task(self.shutdown.subscribe());
        self.shutdown.register(checkpoint).await;

        if self.config.query.fast_groups {
            let rollup = self.analytics.start_rollup_task(
                self.config.query.rollup_interval_secs,
                self.shutdown.subscribe(),
            );
            self.shutdown.register(rollup).await;
        } else {
            tracing::debug!("Rollup task disabled (fast groups off)");
        }
    }
}

/// `SPANLENS_LOG` (or `RUST_LOG`) sets the filter; `SPANLENS_LOG_FORMAT=json` switches
/// to one JSON object per line
fn init_logging() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| format!("info,{}=info", APP_NAME_LOWER));
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.compact().with_ansi(true).init();
    }
}
