use crate::core::engine::EngineSettings;
use crate::core::slot_calendar::WorkingHours;
use crate::core::time_normalizer::DEFAULT_TIMEZONE;
use crate::domain::model::Provider;
use crate::utils::error::{Result, SchedulingError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, Validate,
};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    pub venue: VenueConfig,
    #[serde(default)]
    pub working_hours: WorkingHours,
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: Vec<Provider>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    /// IANA 時區名稱，例如 `Europe/Istanbul`
    pub timezone: Option<String>,
    /// `["Sun"]`、`["Saturday", "Sunday"]`
    pub closed_weekdays: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl ShopConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SchedulingError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SchedulingError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SHOP_DATA_DIR})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SchedulingError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("venue.name", &self.venue.name)?;
        validate_path("store.path", &self.store.path)?;
        self.timezone()?;
        self.closed_weekdays()?;
        self.working_hours.validate()?;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            validate_positive_number("providers.id", provider.id.0, 1)?;
            validate_non_empty_string("providers.name", &provider.name)?;
            if !seen.insert(provider.id) {
                return Err(SchedulingError::InvalidConfigValueError {
                    field: "providers.id".to_string(),
                    value: provider.id.to_string(),
                    reason: "Provider ids must be unique".to_string(),
                });
            }
        }

        if let Some(level) = self.log_level() {
            if !VALID_LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(SchedulingError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!(
                        "Unsupported level. Valid levels: {}",
                        VALID_LOG_LEVELS.join(", ")
                    ),
                });
            }
        }

        Ok(())
    }

    /// 取得店內時區，未設定時使用預設時區
    pub fn timezone(&self) -> Result<Tz> {
        match self.venue.timezone.as_deref() {
            None => Ok(DEFAULT_TIMEZONE),
            Some(name) => Tz::from_str(name.trim()).map_err(|_| {
                SchedulingError::InvalidConfigValueError {
                    field: "venue.timezone".to_string(),
                    value: name.to_string(),
                    reason: "Unknown IANA time zone".to_string(),
                }
            }),
        }
    }

    /// 取得公休日
    pub fn closed_weekdays(&self) -> Result<Vec<Weekday>> {
        self.venue
            .closed_weekdays
            .iter()
            .flatten()
            .map(|raw| {
                Weekday::from_str(raw.trim()).map_err(|_| SchedulingError::InvalidConfigValueError {
                    field: "venue.closed_weekdays".to_string(),
                    value: raw.clone(),
                    reason: "Expected a weekday such as Mon or Sunday".to_string(),
                })
            })
            .collect()
    }

    pub fn store_path(&self) -> &str {
        &self.store.path
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    /// 轉成排程引擎使用的設定
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            working_hours: self.working_hours,
            timezone: self.timezone()?,
            closed_weekdays: self.closed_weekdays()?,
        })
    }
}

impl Validate for ShopConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
