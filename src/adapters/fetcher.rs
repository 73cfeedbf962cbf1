use crate::adapters::traversal::HalTraversal;
use crate::domain::model::Page;
use crate::domain::ports::{PageFetcher, ResourcePath, ServiceDiscovery};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// PageFetcher over HTTP: discovery lookup, then one HAL page traversal.
pub struct HttpPageFetcher<D> {
    discovery: Arc<D>,
    traversal: HalTraversal,
}

impl<D: ServiceDiscovery> HttpPageFetcher<D> {
    pub fn new(discovery: Arc<D>, traversal: HalTraversal) -> Self {
        Self {
            discovery,
            traversal,
        }
    }
}

#[async_trait]
impl<D, T> PageFetcher<T> for HttpPageFetcher<D>
where
    D: ServiceDiscovery + 'static,
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(
        &self,
        service_name: &str,
        resource: &ResourcePath,
        page_index: usize,
    ) -> Result<Page<T>> {
        let base = self.discovery.resolve(service_name)?;
        let target = resource_url(&base, &resource.path)?;
        tracing::debug!(service = service_name, url = %target, page = page_index, "fetching page");

        self.traversal
            .fetch_page(&target, &resource.relation, page_index)
            .await
    }
}

/// Appends `path` to `base` segment by segment so ids are percent-encoded.
fn resource_url(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| GatewayError::ConfigError {
            message: format!("{} cannot be used as a base URL", base),
        })?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::discovery::StaticRegistry;
    use crate::domain::model::Store;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_resource_url_encodes_segments() {
        let base = Url::parse("http://customers:8080/api/").unwrap();
        let url = resource_url(&base, "customers/a b").unwrap();
        assert_eq!(url.as_str(), "http://customers:8080/api/customers/a%20b");
    }

    #[tokio::test]
    async fn test_unregistered_service() {
        let fetcher = HttpPageFetcher::new(Arc::new(StaticRegistry::new()), HalTraversal::new());
        let result: Result<Page<Store>> = fetcher
            .fetch_page(
                "CUSTOMERS",
                &ResourcePath::new("customers/1", "stores-nearby"),
                0,
            )
            .await;

        assert!(matches!(result, Err(GatewayError::ServiceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_fetches_through_registry() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/customers/7");
            then.status(200).json_body(json!({
                "_links": { "stores-nearby": { "href": "/customers/7/stores" } }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/customers/7/stores").query_param("page", "0");
            then.status(200).json_body(json!({
                "_embedded": { "stores": [
                    { "id": "S1", "name": "Corner", "address": {
                        "street": "Windy Avenue", "city": "Nowhere", "zip": "99999",
                        "location": { "x": 0.0, "y": 0.0 } } }
                ] }
            }));
        });

        let mut registry = StaticRegistry::new();
        registry.register("CUSTOMERS", &server.base_url()).unwrap();
        let fetcher = HttpPageFetcher::new(Arc::new(registry), HalTraversal::new());

        let page: Page<Store> = fetcher
            .fetch_page(
                "CUSTOMERS",
                &ResourcePath::new("customers/7", "stores-nearby"),
                0,
            )
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].address.city, "Nowhere");
    }
}
