use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::parameters::{DEFAULT_INFECTIOUS_DAYS, DEFAULT_MARKET_SHARE, DEFAULT_N_DAYS};
use crate::regions::RegionSource;

const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Runner configuration, read from the TOML file registered as `config` in
/// the run request. Dates are quoted `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChimeConfig {
    pub regions: RegionsConfig,
    pub defaults: ModelDefaults,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegionsConfig {
    pub path: Option<PathBuf>,
    /// CSV export of the regional spreadsheet.
    pub url: Option<String>,
    pub cache_ttl_secs: u64,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        RegionsConfig {
            path: None,
            url: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl RegionsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// A `regions` file named in the run request wins over the configured
    /// path, which wins over the URL.
    pub fn source(&self, request_file: Option<&Path>) -> Result<RegionSource, ConfigurationError> {
        if let Some(path) = request_file.or(self.path.as_deref()) {
            return Ok(RegionSource::Path(path.to_path_buf()));
        }
        match &self.url {
            Some(url) => Ok(RegionSource::Url(url.clone())),
            None => Err(ConfigurationError::NoRegionSource),
        }
    }
}

/// Model inputs the region table does not carry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    pub infectious_days: u32,
    pub market_share: f64,
    pub n_days: u32,
    pub date_first_hospitalized: Option<NaiveDate>,
    pub mitigation_date: Option<NaiveDate>,
    pub max_y_axis: Option<u64>,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        ModelDefaults {
            infectious_days: DEFAULT_INFECTIOUS_DAYS,
            market_share: DEFAULT_MARKET_SHARE,
            n_days: DEFAULT_N_DAYS,
            date_first_hospitalized: None,
            mitigation_date: None,
            max_y_axis: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ChimeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ChimeConfig::default());
        assert_eq!(config.defaults.infectious_days, 14);
        assert_eq!(config.defaults.market_share, 0.15);
        assert_eq!(config.defaults.n_days, 100);
        assert_eq!(config.regions.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let config: ChimeConfig = toml::from_str(
            r#"
            [regions]
            url = "https://example.org/regions.csv"
            cache_ttl_secs = 60

            [defaults]
            market_share = 0.3
            n_days = 60
            date_first_hospitalized = "2020-03-07"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.regions.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.defaults.market_share, 0.3);
        assert_eq!(config.defaults.infectious_days, 14);
        assert_eq!(config.defaults.n_days, 60);
        assert_eq!(
            config.defaults.date_first_hospitalized,
            NaiveDate::from_ymd_opt(2020, 3, 7)
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_region_source_precedence() {
        let regions = RegionsConfig {
            path: Some(PathBuf::from("configured.csv")),
            url: Some("https://example.org/regions.csv".to_string()),
            ..RegionsConfig::default()
        };
        assert_eq!(
            regions.source(Some(Path::new("request.csv"))).unwrap(),
            RegionSource::Path(PathBuf::from("request.csv"))
        );
        assert_eq!(
            regions.source(None).unwrap(),
            RegionSource::Path(PathBuf::from("configured.csv"))
        );

        let url_only = RegionsConfig {
            path: None,
            ..regions
        };
        assert_eq!(
            url_only.source(None).unwrap(),
            RegionSource::Url("https://example.org/regions.csv".to_string())
        );

        assert_eq!(
            RegionsConfig::default().source(None),
            Err(ConfigurationError::NoRegionSource)
        );
    }
}
