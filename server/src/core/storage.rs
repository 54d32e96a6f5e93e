//! Data directory layout
//!
//! The data directory is taken from `--data-dir` / `SPANLENS_DATA_DIR` / config `data_dir`
//! when set, otherwise the platform data directory:
//!
//! | Windows | macOS | Linux |
//! |---------|-------|-------|
//! | `%APPDATA%\Spanlens\` | `~/Library/Application Support/Spanlens/` | `$XDG_DATA_HOME/spanlens/` |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::config::AppConfig;
use super::constants::{APP_DOT_FOLDER, APP_NAME};

/// Subdirectories of the data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSubdir {
    Duckdb,
}

impl DataSubdir {
    const ALL: [DataSubdir; 1] = [DataSubdir::Duckdb];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DataSubdir::Duckdb => "duckdb",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
}

impl AppStorage {
    /// Create the data directory tree and pin its absolute location
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => platform_data_dir(),
        };
        let storage = Self::create(data_dir).await?;
        tracing::debug!(data_dir = %storage.data_dir.display(), "Storage initialized");
        Ok(storage)
    }

    async fn create(data_dir: PathBuf) -> Result<Self> {
        for subdir in DataSubdir::ALL {
            let path = data_dir.join(subdir.as_str());
            tokio::fs::create_dir_all(&path)
                .await
                .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        }
        // Only resolvable once it exists
        let data_dir = tokio::fs::canonicalize(&data_dir).await.unwrap_or(data_dir);
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn subdir(&self, subdir: DataSubdir) -> PathBuf {
        self.data_dir.join(subdir.as_str())
    }

    #[cfg(test)]
    pub fn init_for_test(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

/// Platform data directory, or `./.spanlens` when the platform has none
fn platform_data_dir() -> PathBuf {
    match ProjectDirs::from("", "", APP_NAME) {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(APP_DOT_FOLDER),
    }
}
