use crate::config::Settings;
use crate::utils::error::{GatewayError, Result};
use regex::Regex;
use std::path::Path;

impl Settings {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GatewayError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GatewayError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// 替換環境變數 (例如 ${CUSTOMERS_URL})，未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GatewayError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:9000"
json_logs = true

[aggregation]
max_pages = 3
request_deadline_ms = 750
per_call_timeout_ms = 200
detail_batch_window_ms = 250
detail_batch_cap = 5

[breaker]
failure_rate_threshold = 0.25
minimum_calls = 4
window_ms = 2000
cooldown_ms = 1000

[services]
CUSTOMERS = ["http://customers-1:8080", "http://customers-2:8080"]
RECOMMENDATIONS = ["http://recommendations:8080"]
"#;

        let settings = Settings::from_toml_str(toml_content).unwrap();

        assert_eq!(settings.server.bind_address, "0.0.0.0:9000");
        assert!(settings.server.json_logs);
        assert_eq!(settings.aggregation.max_pages, 3);
        assert_eq!(settings.aggregation.detail_batch_cap, 5);
        assert_eq!(settings.breaker.minimum_calls, 4);
        assert_eq!(settings.services["CUSTOMERS"].len(), 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let settings = Settings::from_toml_str("[aggregation]\nmax_pages = 2\n").unwrap();

        assert_eq!(settings.aggregation.max_pages, 2);
        assert_eq!(settings.aggregation.request_deadline_ms, 1000);
        assert_eq!(settings.breaker.cooldown_ms, 5000);
        assert!(settings.services.is_empty());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_GATEWAY_CUSTOMERS_URL", "http://customers.internal:8080");

        let toml_content = r#"
[services]
CUSTOMERS = ["${TEST_GATEWAY_CUSTOMERS_URL}"]
"#;

        let settings = Settings::from_toml_str(toml_content).unwrap();
        assert_eq!(
            settings.services["CUSTOMERS"],
            vec!["http://customers.internal:8080".to_string()]
        );

        std::env::remove_var("TEST_GATEWAY_CUSTOMERS_URL");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Settings::from_toml_str("[aggregation\nmax_pages = ").unwrap_err();
        assert!(matches!(err, GatewayError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nbind_address = \"127.0.0.1:0\"\n")
            .unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.server.bind_address, "127.0.0.1:0");
    }
}
