use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::Period;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_universe_file() -> String {
    "nifty500_symbols.csv".into()
}

fn default_period() -> String {
    "1y".into()
}

fn default_concurrency() -> usize {
    8
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub screener: ScreenerConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default = "default_universe_file")]
    pub universe_file: String,
    /// Default chart window for detail views; the summary table always
    /// works from five years of history.
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_true")]
    pub include_live_prices: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl ScreenerConfig {
    pub fn period(&self) -> Option<Period> {
        Period::from_str(&self.period)
    }
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            universe_file: default_universe_file(),
            period: default_period(),
            concurrency: default_concurrency(),
            include_live_prices: true,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SourceConfig {
    /// Override for the chart endpoint base URL; `None` uses Yahoo.
    pub base_url: Option<String>,
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

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.screener.period().is_none() {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "screener.period: unknown period \"{}\"",
                config.screener.period
            ),
        }));
    }
    if config.screener.concurrency == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "screener.concurrency must be > 0".into(),
        }));
    }
    if config.screener.cache_ttl_secs == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "screener.cache_ttl_secs must be > 0".into(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"

[screener]
universe_file = "universe.csv"
period = "2y"
concurrency = 16
include_live_prices = false
cache_ttl_secs = 120

[source]
base_url = "http://localhost:9999"
"#;
        let config = parse(toml);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.screener.universe_file, "universe.csv");
        assert_eq!(config.screener.period(), Some(Period::Year2));
        assert_eq!(config.screener.concurrency, 16);
        assert!(!config.screener.include_live_prices);
        assert_eq!(config.source.base_url.as_deref(), Some("http://localhost:9999"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let config = parse("");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.screener.universe_file, "nifty500_symbols.csv");
        assert_eq!(config.screener.period(), Some(Period::Year1));
        assert_eq!(config.screener.concurrency, 8);
        assert!(config.screener.include_live_prices);
        assert_eq!(config.screener.cache_ttl_secs, 60);
        assert_eq!(config.source.base_url, None);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn unknown_period_rejected() {
        let config = parse("[screener]\nperiod = \"10y\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = parse("[screener]\nconcurrency = 0\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_cache_ttl_rejected() {
        let config = parse("[screener]\ncache_ttl_secs = 0\n");
        assert!(validate(&config).is_err());
    }
}
