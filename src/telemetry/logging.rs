//! Logging configuration and initialization
//!
//! Console output goes to stderr so stdout stays free. File output is
//! written through a non-blocking appender; keep the returned guard alive
//! until exit so buffered lines are flushed.

use std::path::PathBuf;

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

/// Environment variable holding the log filter
pub const LOG_FILTER_ENV: &str = "LOOP_PLAYER_LOG";
/// Environment variable selecting the output format (`json`)
pub const LOG_FORMAT_ENV: &str = "LOOP_PLAYER_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Enable file logging (default: false)
    pub file_enabled: bool,
    /// Path of the log file (default: `loop-player.log` in the working directory)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    fn log_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("loop-player.log"))
    }
}

/// JSON output if the format variable says so, otherwise the configured choice
fn wants_json(format_env: Option<&str>, configured: bool) -> bool {
    match format_env {
        Some(value) => value.eq_ignore_ascii_case("json"),
        None => configured,
    }
}

/// Install the global subscriber
///
/// The filter comes from `LOOP_PLAYER_LOG`, then `RUST_LOG`, then
/// `config.default_level`. Returns the file writer's guard when file
/// logging is enabled.
pub fn init_logging(config: &LogConfig) -> Result<Option<LogGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .or_else(|_| EnvFilter::try_new(&config.default_level))?;

    let format_env = std::env::var(LOG_FORMAT_ENV).ok();
    let use_json = wants_json(format_env.as_deref(), config.json_format);

    let console_layer = config.console_enabled.then(|| {
        if use_json {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .compact()
                .boxed()
        }
    });

    let mut file_guard = None;
    let file_layer = if config.file_enabled {
        let log_path = config.log_path();
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);
        Some(if use_json { layer.json().boxed() } else { layer.boxed() })
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        target: "loop_player",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}
