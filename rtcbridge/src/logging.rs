//! `tracing` subscriber setup for processes embedding the bridge

use std::fs::{File, OpenOptions};
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};

/// Targets of the engine stack, capped so ICE/DTLS chatter does not drown
/// negotiation and delivery events
const ENGINE_TARGETS: &[&str] = &["webrtc", "webrtc_ice", "webrtc_dtls", "webrtc_sctp"];

/// Initialize structured logging
///
/// `RUST_LOG` wins over the configured level when set. With `file_path` the
/// output is appended to that file instead of stdout.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let writer = config.file_path.as_deref().map(open_log_file).transpose()?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true)
                .with_line_number(true);
            match writer {
                Some(file) => registry.with(layer.with_writer(file)).try_init()?,
                None => registry.with(layer).try_init()?,
            }
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_line_number(true)
                .with_file(false);
            match writer {
                Some(file) => registry.with(layer.with_writer(file)).try_init()?,
                None => registry.with(layer).try_init()?,
            }
        }
    }

    info!(level = %level, format = ?config.format, "Logging initialized");
    Ok(())
}

fn default_filter(level: Level) -> EnvFilter {
    let mut directives = level.to_string().to_lowercase();
    for target in ENGINE_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    EnvFilter::new(directives)
}

fn open_log_file(path: &str) -> std::io::Result<Arc<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Arc::new)
}

/// Parse a configured level name
pub(crate) fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(Error::Configuration(format!("Invalid log level: {level}"))),
    }
}
