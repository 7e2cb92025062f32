use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::engine::EngineSettings;
use crate::error::ConfigError;
use crate::render::OutputFormat;
use crate::source::http::DEFAULT_BASE_URL;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_source_kind() -> String {
    "http".into()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_requests_per_second() -> u32 {
    2
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub indicators: EngineSettings,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub output: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            output: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Accepted values: `"http"` | `"file"`
    #[serde(default = "default_source_kind")]
    pub kind: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to the `TDA_API_KEY` environment variable.
    pub api_key: Option<String>,
    /// Payload path for `kind = "file"`.
    pub path: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            base_url: default_base_url(),
            api_key: None,
            path: None,
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_SOURCE_KINDS: &[&str] = &["http", "file"];

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_source(config)?;
    validate_indicators(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    Ok(())
}

fn validate_source(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let source = &config.source;
    if !VALID_SOURCE_KINDS.contains(&source.kind.as_str()) {
        return Err(invalid(format!(
            "source.kind \"{}\" is not valid",
            source.kind
        )));
    }
    if source.kind == "file" && source.path.as_deref().is_none_or(str::is_empty) {
        return Err(invalid(
            "source.path is required for kind \"file\"".into(),
        ));
    }
    if source.requests_per_second == 0 {
        return Err(invalid("source.requests_per_second must be > 0".into()));
    }
    Ok(())
}

fn validate_indicators(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let s = &config.indicators;
    let periods = [
        ("lookback_period", s.lookback_period),
        ("ema_period", s.ema_period),
        ("rsi_period", s.rsi_period),
        ("macd_fast", s.macd_fast),
        ("macd_slow", s.macd_slow),
        ("chaikin_period", s.chaikin_period),
        ("chaikin_fast", s.chaikin_fast),
        ("chaikin_slow", s.chaikin_slow),
    ];
    for (name, value) in periods {
        if value == 0 {
            return Err(invalid(format!("indicators.{name} must be > 0")));
        }
    }
    if s.macd_fast >= s.macd_slow {
        return Err(invalid(
            "indicators.macd_fast must be < indicators.macd_slow".into(),
        ));
    }
    if s.chaikin_fast >= s.chaikin_slow {
        return Err(invalid(
            "indicators.chaikin_fast must be < indicators.chaikin_slow".into(),
        ));
    }
    if s.bollinger_period < 2 {
        return Err(invalid("indicators.bollinger_period must be >= 2".into()));
    }
    if !(s.bollinger_multiplier.is_finite() && s.bollinger_multiplier > 0.0) {
        return Err(invalid(
            "indicators.bollinger_multiplier must be finite and > 0".into(),
        ));
    }
    Ok(())
}
