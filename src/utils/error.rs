use crate::domain::model::FailureKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Service not registered: {service}")]
    ServiceNotFound { service: String },

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Upstream returned a malformed payload: {message}")]
    UpstreamMalformed { message: String },

    #[error("Call timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Call cancelled before completion")]
    Cancelled,

    #[error("Invalid customer id '{value}': {reason}")]
    InvalidCustomerId { value: String, reason: String },

    #[error("Result was already delivered to the caller")]
    AlreadyResolved,

    #[error("Result sink dropped before a result was delivered")]
    SinkDropped,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Upstream,
    Request,
    Delivery,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        // 解碼失敗代表上游違反契約，其餘一律視為暫時性不可用
        if err.is_decode() {
            GatewayError::UpstreamMalformed {
                message: err.to_string(),
            }
        } else {
            GatewayError::UpstreamUnavailable {
                message: err.to_string(),
            }
        }
    }
}

impl GatewayError {
    /// Maps a downstream error onto the failure taxonomy used by the breaker.
    /// Returns `None` for errors that never come out of a downstream call.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            GatewayError::ServiceNotFound { .. } => Some(FailureKind::ServiceNotFound),
            GatewayError::UpstreamUnavailable { .. } | GatewayError::IoError(_) => {
                Some(FailureKind::UpstreamUnavailable)
            }
            GatewayError::UpstreamMalformed { .. } | GatewayError::SerializationError(_) => {
                Some(FailureKind::UpstreamMalformed)
            }
            GatewayError::Timeout { .. } => Some(FailureKind::Timeout),
            GatewayError::Cancelled => Some(FailureKind::Cancelled),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::ServiceNotFound { .. }
            | GatewayError::UpstreamUnavailable { .. }
            | GatewayError::UpstreamMalformed { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::Cancelled
            | GatewayError::SerializationError(_) => ErrorCategory::Upstream,
            GatewayError::InvalidCustomerId { .. } => ErrorCategory::Request,
            GatewayError::AlreadyResolved | GatewayError::SinkDropped => ErrorCategory::Delivery,
            GatewayError::ConfigError { .. }
            | GatewayError::InvalidConfigValueError { .. }
            | GatewayError::MissingConfigError { .. }
            | GatewayError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            GatewayError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Delivery | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            GatewayError::ServiceNotFound { .. } => {
                "Register the service under [services] in the config file or pass --service NAME=URL"
            }
            GatewayError::UpstreamUnavailable { .. } | GatewayError::Timeout { .. } => {
                "Check that the downstream service is running and reachable"
            }
            GatewayError::UpstreamMalformed { .. } | GatewayError::SerializationError(_) => {
                "The downstream response no longer matches the expected HAL format"
            }
            GatewayError::InvalidCustomerId { .. } => "Pass a non-empty customer id",
            GatewayError::ConfigError { .. }
            | GatewayError::InvalidConfigValueError { .. }
            | GatewayError::MissingConfigError { .. }
            | GatewayError::ConfigValidationError { .. } => {
                "Review the configuration file and command line flags"
            }
            GatewayError::IoError(_) => "Check file permissions and that the path exists",
            GatewayError::Cancelled | GatewayError::AlreadyResolved | GatewayError::SinkDropped => {
                "Retry the request"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Upstream => format!("A downstream service failed: {}", self),
            ErrorCategory::Request => format!("The request was rejected: {}", self),
            ErrorCategory::Delivery => format!("The result could not be delivered: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        let err = GatewayError::ServiceNotFound {
            service: "CUSTOMERS".to_string(),
        };
        assert_eq!(err.failure_kind(), Some(FailureKind::ServiceNotFound));

        let err = GatewayError::Timeout {
            elapsed: Duration::from_millis(300),
        };
        assert_eq!(err.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(GatewayError::Cancelled.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(GatewayError::AlreadyResolved.failure_kind(), None);
    }

    #[test]
    fn test_severity_follows_category() {
        let err = GatewayError::InvalidCustomerId {
            value: " ".to_string(),
            reason: "empty".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Request);
        assert_eq!(err.severity(), ErrorSeverity::Low);

        let err = GatewayError::MissingConfigError {
            field: "services".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().starts_with("Configuration problem"));
    }
}
