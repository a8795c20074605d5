use crate::domain::options::{AnalyticsOptions, BucketWidth, DEFAULT_DEEP_DISCHARGE_SOC};
use serde::Deserialize;

/// One week; longer sessions would serve badly stale telemetry.
const MAX_CACHE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub authorized_imeis: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsSettings {
    #[serde(default)]
    pub bucket_width: BucketWidth,
    #[serde(default = "default_deep_discharge_soc")]
    pub deep_discharge_soc: f64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            bucket_width: BucketWidth::default(),
            deep_discharge_soc: default_deep_discharge_soc(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl AnalyticsSettings {
    pub fn options(&self) -> anyhow::Result<AnalyticsOptions> {
        Ok(AnalyticsOptions::new(
            self.bucket_width,
            self.deep_discharge_soc,
        )?)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    10_000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_deep_discharge_soc() -> f64 {
    DEFAULT_DEEP_DISCHARGE_SOC
}

fn default_cache_ttl_secs() -> i64 {
    300
}

/// `config/battery.toml`, overridden by `BATTERY__SECTION__KEY` variables.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/battery"))
        .add_source(
            config::Environment::with_prefix("BATTERY")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.authorized_imeis")
                .try_parsing(true),
        )
        .build()?;

    validate(settings.try_deserialize()?)
}

pub fn validate(config: AppConfig) -> anyhow::Result<AppConfig> {
    if config.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }
    if config.api.batch_size == 0 {
        anyhow::bail!("api.batch_size must be positive");
    }
    if config.api.max_pages == 0 {
        anyhow::bail!("api.max_pages must be positive");
    }
    if config.api.authorized_imeis.is_empty() {
        tracing::warn!("No authorized IMEIs configured; every battery request will be rejected");
    }
    if !(0..=MAX_CACHE_TTL_SECS).contains(&config.analytics.cache_ttl_secs) {
        anyhow::bail!(
            "analytics.cache_ttl_secs must be between 0 and {}",
            MAX_CACHE_TTL_SECS
        );
    }
    config.analytics.options()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::{Config, File, FileFormat};

    fn parse(toml: &str) -> anyhow::Result<AppConfig> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        validate(settings.try_deserialize()?)
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse(
            r#"
            [api]
            base_url = "https://battery.example.com"
            authorized_imeis = ["865044073967657"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.api.batch_size, 100);
        assert_eq!(config.api.max_pages, 10_000);
        assert_eq!(config.analytics.bucket_width, BucketWidth::Ten);
        assert_eq!(config.analytics.deep_discharge_soc, 30.0);
        assert_eq!(config.analytics.cache_ttl(), chrono::Duration::seconds(300));
    }

    #[test]
    fn test_bucket_width_must_be_supported() {
        let err = parse(
            r#"
            [api]
            base_url = "https://battery.example.com"

            [analytics]
            bucket_width = 12
            "#,
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("12"));
    }

    #[test]
    fn test_cache_ttl_is_bounded() {
        let err = parse(
            r#"
            [api]
            base_url = "https://battery.example.com"

            [analytics]
            cache_ttl_secs = 9223372036854775807
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("cache_ttl_secs"));
    }

    #[test]
    fn test_threshold_is_validated() {
        let result = parse(
            r#"
            [api]
            base_url = "https://battery.example.com"

            [analytics]
            bucket_width = 20
            deep_discharge_soc = 140.0
            "#,
        );

        assert!(result.is_err());
    }
}
