#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::breaker::CircuitBreakerConfig;
use crate::utils::error::{GatewayError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_socket_addr,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub aggregation: AggregationSettings,
    pub breaker: BreakerSettings,
    /// 邏輯服務名稱 → 實例 URL 清單
    pub services: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub json_logs: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    pub max_pages: usize,
    pub request_deadline_ms: u64,
    pub per_call_timeout_ms: u64,
    pub detail_batch_window_ms: u64,
    pub detail_batch_cap: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            max_pages: 10,
            request_deadline_ms: 1000,
            per_call_timeout_ms: 300,
            detail_batch_window_ms: 500,
            detail_batch_cap: 10,
        }
    }
}

impl AggregationSettings {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }

    pub fn detail_batch_window(&self) -> Duration {
        Duration::from_millis(self.detail_batch_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_rate_threshold: f64,
    pub minimum_calls: u32,
    pub window_ms: u64,
    pub cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            minimum_calls: 20,
            window_ms: 10_000,
            cooldown_ms: 5_000,
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_rate_threshold: settings.failure_rate_threshold,
            minimum_calls: settings.minimum_calls,
            window: Duration::from_millis(settings.window_ms),
            cooldown: Duration::from_millis(settings.cooldown_ms),
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_socket_addr("server.bind_address", &self.server.bind_address)?;

        let aggregation = &self.aggregation;
        validate_positive_number("aggregation.max_pages", aggregation.max_pages as u64, 1)?;
        validate_positive_number(
            "aggregation.request_deadline_ms",
            aggregation.request_deadline_ms,
            1,
        )?;
        validate_positive_number(
            "aggregation.per_call_timeout_ms",
            aggregation.per_call_timeout_ms,
            1,
        )?;
        validate_positive_number(
            "aggregation.detail_batch_window_ms",
            aggregation.detail_batch_window_ms,
            1,
        )?;
        validate_positive_number(
            "aggregation.detail_batch_cap",
            aggregation.detail_batch_cap as u64,
            1,
        )?;

        validate_range(
            "breaker.failure_rate_threshold",
            self.breaker.failure_rate_threshold,
            0.01,
            1.0,
        )?;
        validate_positive_number("breaker.minimum_calls", self.breaker.minimum_calls.into(), 1)?;
        validate_positive_number("breaker.window_ms", self.breaker.window_ms, 1)?;

        for (name, urls) in &self.services {
            validate_non_empty_string("services", name)?;
            if urls.is_empty() {
                return Err(GatewayError::MissingConfigError {
                    field: format!("services.{}", name),
                });
            }
            for url in urls {
                validate_url(&format!("services.{}", name), url)?;
            }
        }

        Ok(())
    }
}
