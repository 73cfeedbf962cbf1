use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 彙總請求的客戶識別碼，除了非空之外不做任何驗證
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(GatewayError::InvalidCustomerId {
                value,
                reason: "customer id cannot be empty or whitespace-only".to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: String,
    #[serde(default)]
    pub location: Point,
}

/// A store discovered through the nearby-stores listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub store_id: String,
}

/// 一家店與其推薦清單，回傳給呼叫端的最小單位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDetails {
    pub store: Store,
    pub recommendations: Vec<Recommendation>,
}

/// One page of a paginated upstream collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_pages: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: usize) -> Self {
        Self {
            items,
            number,
            total_pages: None,
        }
    }

    pub fn empty(number: usize) -> Self {
        Self::new(Vec::new(), number)
    }

    pub fn with_total_pages(mut self, total_pages: usize) -> Self {
        self.total_pages = Some(total_pages);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// An empty page always ends the traversal; page metadata can end it earlier.
    pub fn is_last(&self) -> bool {
        self.is_empty() || self.total_pages.is_some_and(|total| self.number + 1 >= total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ServiceNotFound,
    UpstreamUnavailable,
    UpstreamMalformed,
    Timeout,
    Cancelled,
    ShortCircuited,
}

impl FailureKind {
    /// Cancellation and short-circuits are not the downstream's fault.
    pub fn counts_toward_breaker(self) -> bool {
        !matches!(self, FailureKind::Cancelled | FailureKind::ShortCircuited)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::ServiceNotFound => "service_not_found",
            FailureKind::UpstreamUnavailable => "upstream_unavailable",
            FailureKind::UpstreamMalformed => "upstream_malformed",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::ShortCircuited => "short_circuited",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    Failure { kind: FailureKind, cause: String },
    FallbackUsed { value: T, kind: FailureKind },
}

impl<T> CallOutcome<T> {
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Failure { kind, .. } | CallOutcome::FallbackUsed { kind, .. } => {
                Some(*kind)
            }
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            CallOutcome::Success(value) | CallOutcome::FallbackUsed { value, .. } => Some(value),
            CallOutcome::Failure { .. } => None,
        }
    }
}
