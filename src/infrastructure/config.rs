//! Configuration infrastructure
//!
//! Settings are layered, lowest precedence first:
//! 1. compiled defaults (`defaults` module)
//! 2. optional TOML file (`--config`, else the user config dir)
//! 3. `HARVESTER_<SECTION>__<KEY>` environment variables
//! 4. command-line overrides applied by the caller

#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default values, tuned to stay polite with the catalog host
pub mod defaults {
    pub const TEAM_WORKERS: usize = 4;
    pub const PLAYER_WORKERS: usize = 8;
    pub const IMAGE_WORKERS: usize = 6;

    pub const REQUEST_DELAY_MS: u64 = 500;
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 0;
    pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/104.0.0.0 Safari/537.36";
    pub const SOFT_404_MARKER: &str = "<!DOCTYPE html>";

    pub const BASE_URL: &str = "https://www.pesmaster.com";
    pub const EDITION: &str = "efootball-2022";
    pub const UPDATES_PATH: &str = "player/featured/";
    pub const LEAGUE_BLOCK_INDEX: usize = 1;

    pub const OUTPUT_ROOT: &str = "Minifaces";
    pub const SKIP_LIST: &str = "skipped_ids.txt";
    pub const TEXTURE_EXTENSION: &str = "dds";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIR: &str = "logs";

    pub const ENV_PREFIX: &str = "HARVESTER";
    pub const APP_DIR_NAME: &str = "miniface-harvester";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete harvester configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HarvestConfig {
    pub workers: WorkerConfig,
    pub network: NetworkConfig,
    pub catalog: CatalogConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Pool widths per hierarchy level. Leagues are always walked one at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub teams: usize,
    pub players: usize,
    pub images: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Sleep before every outbound request
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Total attempts per URL for transient failures
    pub max_retries: u32,
    /// Backoff before attempt n+1 is `retry_base_delay_ms * 2^n`
    pub retry_base_delay_ms: u64,
    /// Global cap enforced by the transport; 0 disables it
    pub max_requests_per_second: u32,
    pub user_agent: String,
    /// Body prefix of the host's "soft 404" HTML page
    pub soft_404_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub edition: String,
    pub updates_path: String,
    /// Which `team-block-container` on the root page lists the leagues
    pub league_block_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root_dir: PathBuf,
    /// Durable skip-list; relative paths resolve under `root_dir`
    pub skip_list: PathBuf,
    pub texture_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    pub json_format: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            teams: defaults::TEAM_WORKERS,
            players: defaults::PLAYER_WORKERS,
            images: defaults::IMAGE_WORKERS,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
            soft_404_marker: defaults::SOFT_404_MARKER.to_string(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            edition: defaults::EDITION.to_string(),
            updates_path: defaults::UPDATES_PATH.to_string(),
            league_block_index: defaults::LEAGUE_BLOCK_INDEX,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(defaults::OUTPUT_ROOT),
            skip_list: PathBuf::from(defaults::SKIP_LIST),
            texture_extension: defaults::TEXTURE_EXTENSION.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            file_output: false,
            log_dir: PathBuf::from(defaults::LOG_DIR),
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub const fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl CatalogConfig {
    /// Root page of the configured edition, e.g. `https://www.pesmaster.com/efootball-2022/`
    #[must_use]
    pub fn edition_url(&self) -> String {
        format!(
            "{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.edition.trim_matches('/')
        )
    }

    #[must_use]
    pub fn updates_url(&self) -> String {
        format!("{}{}", self.edition_url(), self.updates_path.trim_start_matches('/'))
    }
}

impl OutputConfig {
    #[must_use]
    pub fn skip_list_path(&self) -> PathBuf {
        if self.skip_list.is_absolute() {
            self.skip_list.clone()
        } else {
            self.root_dir.join(&self.skip_list)
        }
    }
}

impl HarvestConfig {
    /// Loads defaults, then the given file (or the user config file when it
    /// exists), then environment overrides.
    ///
    /// Not validated: command-line overrides still apply on top, so callers
    /// run `validate` on the final value.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = Self::source_file(explicit_file) {
            builder = builder.add_source(config::File::from(path).required(explicit_file.is_some()));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The file `load` reads: the explicit one, else the user config file
    /// when it exists.
    #[must_use]
    pub fn source_file(explicit_file: Option<&Path>) -> Option<PathBuf> {
        match explicit_file {
            Some(path) => Some(path.to_path_buf()),
            None => Self::user_config_file().filter(|p| p.exists()),
        }
    }

    /// `<user config dir>/miniface-harvester/config.toml`
    #[must_use]
    pub fn user_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR_NAME).join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let widths = [
            ("workers.teams", self.workers.teams),
            ("workers.players", self.workers.players),
            ("workers.images", self.workers.images),
        ];
        for (name, width) in widths {
            if width == 0 {
                return Err(ConfigError::Validation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        if self.network.max_retries == 0 {
            return Err(ConfigError::Validation {
                message: "network.max_retries must be greater than 0".to_string(),
            });
        }

        if self.network.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "network.request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.output.texture_extension.is_empty() {
            return Err(ConfigError::Validation {
                message: "output.texture_extension must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = HarvestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers.players, 8);
        assert_eq!(config.network.request_delay(), Duration::from_millis(500));
    }

    #[test]
    fn catalog_urls() {
        let catalog = CatalogConfig::default();
        assert_eq!(catalog.edition_url(), "https://www.pesmaster.com/efootball-2022/");
        assert_eq!(
            catalog.updates_url(),
            "https://www.pesmaster.com/efootball-2022/player/featured/"
        );
    }

    #[test]
    fn zero_width_pool_is_rejected() {
        let mut config = HarvestConfig::default();
        config.workers.images = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[workers]\nteams = 2\n\n[network]\nmax_retries = 5").unwrap();

        let config = HarvestConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.workers.teams, 2);
        assert_eq!(config.workers.players, defaults::PLAYER_WORKERS);
        assert_eq!(config.network.max_retries, 5);
    }

    #[test]
    fn relative_skip_list_lives_under_output_root() {
        let output = OutputConfig {
            root_dir: PathBuf::from("out"),
            ..OutputConfig::default()
        };
        assert_eq!(output.skip_list_path(), PathBuf::from("out").join("skipped_ids.txt"));
    }
}
