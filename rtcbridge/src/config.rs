//! Bridge configuration

use crate::error::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcBridgeConfig {
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

/// Output format of the `tracing` subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Negotiation session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Log the full SDP text of every created description
    pub log_sdp: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { log_sdp: true }
    }
}

/// Video adaptation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Capture jitter (microseconds) tolerated before a frame counts as early
    pub framerate_tolerance_us: i64,
    /// Catch panics raised by a sink so the remaining sinks still get the frame
    pub isolate_sink_panics: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            framerate_tolerance_us: 1_000,
            isolate_sink_panics: true,
        }
    }
}

impl RtcBridgeConfig {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // RTCBRIDGE_VIDEO__ISOLATE_SINK_PANICS=false, etc.
        builder = builder.add_source(
            Environment::with_prefix("RTCBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Reject values that deserialize but cannot be used
    pub fn validate(&self) -> Result<()> {
        crate::logging::parse_log_level(&self.logging.level)?;
        if self.video.framerate_tolerance_us < 0 {
            return Err(Error::Configuration(format!(
                "video.framerate_tolerance_us must not be negative, got {}",
                self.video.framerate_tolerance_us
            )));
        }
        Ok(())
    }
}
