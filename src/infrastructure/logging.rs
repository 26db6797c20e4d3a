//! Logging system configuration and initialization
//!
//! - console output on stderr (stdout is reserved for command output)
//! - optional daily-rolling file output through a non-blocking writer
//! - optional JSON formatting
//! - `RUST_LOG` overrides the configured level
//!
//! Dependency targets (`reqwest`, `hyper`, HTML parser internals) are capped
//! at `warn` unless the configured level is `trace`.

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "miniface-harvester.log";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const NOISY_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "html5ever", "selectors"];

/// Keeps the file writer alive; drop it last so buffered lines are flushed
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Builds the filter directive string for a configured level
#[must_use]
pub fn filter_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    let mut directives = level.clone();
    if matches!(level.as_str(), "info" | "debug") {
        for target in NOISY_TARGETS {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    directives
}

pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false);
    if config.json_format {
        layers.push(console.json().boxed());
    } else {
        layers.push(console.boxed());
    }

    let mut file_guard = None;
    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;
        let (writer, guard) = non_blocking(rolling::daily(&config.log_dir, LOG_FILE_PREFIX));
        file_guard = Some(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(writer)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_ansi(false)
            .with_target(true);
        if config.json_format {
            layers.push(file_layer.json().boxed());
        } else {
            layers.push(file_layer.boxed());
        }
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_caps_dependency_noise() {
        let directives = filter_directives("INFO");
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn quiet_and_trace_levels_are_left_alone() {
        assert_eq!(filter_directives("error"), "error");
        assert_eq!(filter_directives("trace"), "trace");
    }
}
