use serde::Deserialize;
use crate::error::{LineError, LineResult};

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CONTRACT_RENEWAL__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub renewal: RenewalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub invoicing: InvoicingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewalConfig {
    /// Renew by closing the line and planning a successor instead of
    /// extending `date_end` in place.
    #[serde(default = "default_create_new_line_on_renew")]
    pub create_new_line_on_renew: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    /// strftime pattern substituted for the `#START#` / `#END#` markers.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_json")]
    pub json: bool,
}

// Default functions
fn default_create_new_line_on_renew() -> bool {
    false
}
fn default_store_path() -> String {
    "contract-lines.json".to_string()
}
fn default_date_format() -> String {
    "%m/%d/%Y".to_string()
}
fn default_interval_secs() -> u64 {
    86_400
}
fn default_json() -> bool {
    true
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            create_new_line_on_renew: default_create_new_line_on_renew(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for InvoicingConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: default_json(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            renewal: RenewalConfig::default(),
            store: StoreConfig::default(),
            invoicing: InvoicingConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "CONTRACT_RENEWAL_CONFIG";

impl AppConfig {
    /// Load configuration from the optional config file and environment
    /// variables. Environment wins over the file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "contract-renewal".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CONTRACT_RENEWAL")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> LineResult<()> {
        if self.store.path.trim().is_empty() {
            return Err(LineError::Config("store.path must not be empty".into()));
        }
        if self.invoicing.date_format.trim().is_empty() {
            return Err(LineError::Config("invoicing.date_format must not be empty".into()));
        }
        if self.schedule.interval_secs == 0 {
            return Err(LineError::Config("schedule.interval_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.renewal.create_new_line_on_renew);
        assert_eq!(config.store.path, "contract-lines.json");
        assert_eq!(config.invoicing.date_format, "%m/%d/%Y");
        assert_eq!(config.schedule.interval_secs, 86_400);
        assert!(config.logging.json);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());
        let mut config = AppConfig::default();
        config.schedule.interval_secs = 0;
        assert!(matches!(config.validate(), Err(LineError::Config(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("does-not-exist/contract-renewal").unwrap();
        assert_eq!(config.store.path, "contract-lines.json");
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "renewal": { "create_new_line_on_renew": true }, "store": {} }"#,
        )
        .unwrap();
        assert!(config.renewal.create_new_line_on_renew);
        assert_eq!(config.store.path, "contract-lines.json");
        assert_eq!(config.invoicing.date_format, "%m/%d/%Y");
    }
}
