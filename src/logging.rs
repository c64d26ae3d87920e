//! Logging setup.
//!
//! Stdout plus optional files. With `enable_multi_stream` three daily-rotated
//! JSON streams are written under `log_dir`:
//!
//! | File | Content |
//! |------|---------|
//! | `house-operational.log` | everything at `operational_level` |
//! | `house-ledger.log` | bid ingestion and settlement at debug |
//! | `house-errors.log` | everything at `error_level` |
//!
//! Targets usable with `RUST_LOG`:
//!
//! ```bash
//! RUST_LOG=warn,house_auction::settle=debug house_auction serve
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::{prelude::*, Error};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(Error::Config(format!("unknown log format '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Single JSON log file next to stdout.
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub enable_multi_stream: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_level")]
    pub operational_level: String,

    #[serde(default = "default_error_level")]
    pub error_level: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_error_level() -> String {
    "warn".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_file: None,
            enable_multi_stream: false,
            log_dir: default_log_dir(),
            operational_level: default_level(),
            error_level: default_error_level(),
        }
    }
}

/// Log targets used by the service.
pub mod targets {
    pub const INGEST: &str = "house_auction::ingest";
    pub const SETTLE: &str = "house_auction::settle";
    pub const PRICING: &str = "house_auction::pricing";
    pub const IDENTITY: &str = "house_auction::identity";
    pub const SERVER: &str = "house_auction::server";
    pub const STORE: &str = "house_auction::store";
}

/// `level` with the noisy HTTP crates quietened.
fn quiet_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::new(level);
    for directive in ["hyper=warn", "reqwest=warn", "tower_http=info"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    filter
}

fn base_filter(config: &LogConfig, override_filter: Option<&str>) -> EnvFilter {
    match override_filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| quiet_filter(&config.level)),
    }
}

fn rolling_writer(
    config: &LogConfig,
    file_name: &str,
    guards: &mut Vec<WorkerGuard>,
) -> NonBlocking {
    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

/// Install the global subscriber.
///
/// The returned guards flush the non-blocking writers and must outlive the
/// program's logging.
pub fn init_logging(config: &LogConfig, override_filter: Option<&str>) -> Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();
    let stdout_filter = base_filter(config, override_filter);

    if config.enable_multi_stream {
        std::fs::create_dir_all(&config.log_dir)
            .map_err(|e| Error::Config(format!("creating {}: {e}", config.log_dir.display())))?;

        let operational = fmt::layer()
            .with_writer(rolling_writer(config, "house-operational.log", &mut guards))
            .with_ansi(false)
            .json()
            .with_filter(quiet_filter(&config.operational_level));

        let ledger = fmt::layer()
            .with_writer(rolling_writer(config, "house-ledger.log", &mut guards))
            .with_ansi(false)
            .json()
            .with_filter(EnvFilter::new(format!(
                "{}=debug,{}=debug",
                targets::INGEST,
                targets::SETTLE
            )));

        let errors = fmt::layer()
            .with_writer(rolling_writer(config, "house-errors.log", &mut guards))
            .with_ansi(false)
            .json()
            .with_filter(EnvFilter::new(&config.error_level));

        let registry = tracing_subscriber::registry()
            .with(operational)
            .with(ledger)
            .with(errors);
        let installed = match config.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_filter(stdout_filter))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_filter(stdout_filter))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(false).with_filter(stdout_filter))
                .try_init(),
        };
        installed.map_err(|e| Error::Config(e.to_string()))?;
        eprintln!("Multi-stream logging enabled: {}", config.log_dir.display());
    } else if let Some(ref log_file) = config.log_file {
        // Both layers are JSON so they share one layer type.
        let file = std::fs::File::create(log_file)
            .map_err(|e| Error::Config(format!("creating {log_file}: {e}")))?;
        tracing_subscriber::registry()
            .with(stdout_filter)
            .with(fmt::layer().json())
            .with(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
            .map_err(|e| Error::Config(e.to_string()))?;
        eprintln!("Logging to file: {log_file}");
    } else {
        let builder = tracing_subscriber::fmt().with_env_filter(stdout_filter);
        let installed = match config.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.with_target(false).try_init(),
        };
        installed.map_err(|e| Error::Config(e.to_string()))?;
    }

    Ok(guards)
}
