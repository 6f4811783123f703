//! Logging system configuration and initialization
//!
//! - Console output for progress lines
//! - Optional file output (plain or JSON lines) under the configured log directory
//! - Previous log file is rotated to a timestamped name on startup
//! - Timestamps in China Standard Time (UTC+8), the upstream sources' local time

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Name of the active log file inside the log directory
pub const LOG_FILE_NAME: &str = "chart-harvester.log";

const CST_OFFSET_SECONDS: i32 = 8 * 3600;

// Keeps the non-blocking file writer alive for the life of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

fn cst_offset() -> FixedOffset {
    FixedOffset::east_opt(CST_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Formats event timestamps in UTC+8
struct CstTimeFormatter;

impl FormatTime for CstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&cst_offset());
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Renames an existing log file to `<stem>.<timestamp>.log`
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: chrono::DateTime<Utc> = file_time.into();
    let local = datetime.with_timezone(&cst_offset());

    let file_stem = log_file_name.trim_end_matches(".log");
    let rotated_name = format!("{}.{}.log", file_stem, local.format("%Y%m%dT%H%M%S"));
    let rotated_path = log_dir.join(&rotated_name);

    std::fs::rename(&log_file_path, &rotated_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            rotated_path.display(),
            e
        )
    })?;
    Ok(())
}

/// Builds the env filter: `RUST_LOG` wins, otherwise the configured level
/// plus per-module directives that keep dependencies quiet.
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);

        // module filters only narrow things down below TRACE
        if !config.level.eq_ignore_ascii_case("trace") {
            let mut modules: Vec<_> = config.module_filters.iter().collect();
            modules.sort();
            for (module, level) in modules {
                match format!("{module}={level}").parse() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(e) => eprintln!("ignoring log directive {module}={level}: {e}"),
                }
            }
        }

        filter
    })
}

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize logging with custom configuration
///
/// Can be called once per process; a second call returns an error.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config);

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(CstTimeFormatter)
            .with_target(false)
            .boxed()
    });

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            anyhow!(
                "Failed to create log directory {}: {}",
                config.log_dir.display(),
                e
            )
        })?;
        rotate_existing_log_file(&config.log_dir, LOG_FILE_NAME)?;

        let file_appender = rolling::never(&config.log_dir, LOG_FILE_NAME);
        let (file_writer, guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard registry poisoned"))?
            .push(guard);

        let layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(CstTimeFormatter)
                .with_target(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(CstTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!(
        level = %config.level,
        file_output = config.file_output,
        "logging initialized"
    );
    Ok(())
}
