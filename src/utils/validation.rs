use crate::utils::error::{GatewayError, Result};
use std::fmt::Display;
use std::net::SocketAddr;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl Display, reason: impl Into<String>) -> GatewayError {
    GatewayError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Service instance URLs must be absolute http(s) URLs.
pub fn validate_url(field: &str, raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(invalid(field, raw, "URL cannot be empty"));
    }

    let url = Url::parse(raw).map_err(|e| invalid(field, raw, format!("Invalid URL format: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            raw,
            format!("Unsupported URL scheme: {}", url.scheme()),
        ));
    }
    Ok(())
}

pub fn validate_socket_addr(field: &str, raw: &str) -> Result<()> {
    raw.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| invalid(field, raw, format!("Not a socket address: {}", e)))
}

pub fn validate_positive_number(field: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(field, value, format!("Value must be at least {}", min_value)));
    }
    Ok(())
}

pub fn validate_non_empty_string(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + Display + Copy>(field: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("services.CUSTOMERS", "https://example.com").is_ok());
        assert!(validate_url("services.CUSTOMERS", "http://localhost:8080").is_ok());
        assert!(validate_url("services.CUSTOMERS", "").is_err());
        assert!(validate_url("services.CUSTOMERS", "invalid-url").is_err());
        assert!(validate_url("services.CUSTOMERS", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_socket_addr() {
        assert!(validate_socket_addr("server.bind_address", "0.0.0.0:8080").is_ok());
        let err = validate_socket_addr("server.bind_address", "localhost").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidConfigValueError { ref field, .. } if field == "server.bind_address"));
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_positive_number("max_pages", 5, 1).is_ok());
        assert!(validate_positive_number("max_pages", 0, 1).is_err());
        assert!(validate_range("threshold", 0.5, 0.01, 1.0).is_ok());
        assert!(validate_range("threshold", 0.0, 0.01, 1.0).is_err());
        assert!(validate_range("threshold", 1.01, 0.01, 1.0).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("bind_address", "127.0.0.1:8080").is_ok());
        assert!(validate_non_empty_string("bind_address", "  ").is_err());
    }
}
