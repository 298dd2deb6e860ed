use crate::config::{ScheduleConfig, StorePolicy};
use crate::utils::error::{BookingError, Result};
use crate::utils::validation::{validate_path, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
    pub fallback: FallbackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the reservation API. Without it the local store acts as primary.
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let policy = StorePolicy::default();
        Self {
            endpoint: None,
            timeout_seconds: policy.timeout.as_secs(),
            retry_attempts: policy.retry_attempts,
            retry_delay_ms: policy.retry_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "./reservations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BookingError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BookingError::ConfigParse {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${STORE_ENDPOINT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BookingError::ConfigParse {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        self.schedule.validate()?;

        if let Some(endpoint) = &self.store.endpoint {
            validate_url("store.endpoint", endpoint)?;
        }

        if self.fallback.enabled {
            validate_path("fallback.path", &self.fallback.path)?;
        }

        if self.store.timeout_seconds == 0 {
            return Err(BookingError::InvalidConfig {
                field: "store.timeout_seconds".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be at least one second".to_string(),
            });
        }

        Ok(())
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            timeout: Duration::from_secs(self.store.timeout_seconds),
            retry_attempts: self.store.retry_attempts,
            retry_delay: Duration::from_millis(self.store.retry_delay_ms),
        }
    }

    /// 取得 API 端點
    pub fn store_endpoint(&self) -> Option<&str> {
        self.store.endpoint.as_deref()
    }

    pub fn fallback_path(&self) -> Option<&str> {
        self.fallback.enabled.then_some(self.fallback.path.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
