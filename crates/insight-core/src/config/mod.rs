mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist. Credentials are
    /// read from the environment only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> anyhow::Result<()> {
        let ingest = &self.ingest;
        ensure!(ingest.chunk_size > 0, "ingest.chunk_size must be greater than 0");
        ensure!(
            ingest.chunk_overlap < ingest.chunk_size,
            "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
            ingest.chunk_overlap,
            ingest.chunk_size
        );
        ensure!(ingest.batch_size > 0, "ingest.batch_size must be greater than 0");
        ensure!(self.answer.top_k > 0, "answer.top_k must be greater than 0");
        ensure!(
            self.answer.timeout_secs > 0,
            "answer.timeout_secs must be greater than 0"
        );
        ensure!(self.llm.timeout_secs > 0, "llm.timeout_secs must be greater than 0");
        ensure!(
            !self.index.path.as_os_str().is_empty(),
            "index.path must not be empty"
        );
        Ok(())
    }
}

/// `--config <path>` from the command line, then `INSIGHT_CONFIG`, then the default path.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("INSIGHT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
