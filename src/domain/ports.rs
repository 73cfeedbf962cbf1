use crate::domain::model::Page;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fmt;
use url::Url;

/// A resource below a service's base URL and the HAL relation to follow from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    pub path: String,
    pub relation: String,
}

impl ResourcePath {
    pub fn new(path: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            relation: relation.into(),
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.relation)
    }
}

/// Resolves a logical service name to a concrete base URL.
pub trait ServiceDiscovery: Send + Sync {
    fn resolve(&self, service_name: &str) -> Result<Url>;
}

/// Fetches one page of a paginated upstream collection. Never retries.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(
        &self,
        service_name: &str,
        resource: &ResourcePath,
        page_index: usize,
    ) -> Result<Page<T>>;
}
