use crate::domain::model::Page;
use crate::utils::error::{GatewayError, Result};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

const HAL_JSON: &str = "application/hal+json";

#[derive(Debug, Deserialize)]
struct HalLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct HalResource {
    #[serde(rename = "_links", default)]
    links: HashMap<String, HalLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMetadata {
    number: Option<usize>,
    total_pages: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct HalCollection {
    #[serde(rename = "_embedded", default)]
    embedded: serde_json::Map<String, serde_json::Value>,
    page: Option<PageMetadata>,
}

/// 跟隨 HAL 連結並解析分頁集合 (Spring HATEOAS 格式)
#[derive(Debug, Clone, Default)]
pub struct HalTraversal {
    client: Client,
}

impl HalTraversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// GETs `base`, follows `_links.{relation}` and decodes page `page_index`
    /// of the embedded collection.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        base: &Url,
        relation: &str,
        page_index: usize,
    ) -> Result<Page<T>> {
        let root: HalResource = self.get_json(base).await?;
        let href = root
            .links
            .get(relation)
            .map(|link| strip_uri_template(&link.href))
            .ok_or_else(|| GatewayError::UpstreamMalformed {
                message: format!("{} has no '{}' link", base, relation),
            })?;

        let mut target = base.join(href).map_err(|e| GatewayError::UpstreamMalformed {
            message: format!("invalid '{}' link '{}': {}", relation, href, e),
        })?;
        set_page_param(&mut target, page_index);

        tracing::debug!(url = %target, relation, page = page_index, "following HAL link");
        let collection: HalCollection = self.get_json(&target).await?;

        // _embedded 內只有一個集合，名稱依資源型別而定
        let items = match collection
            .embedded
            .into_iter()
            .find_map(|(_, value)| value.is_array().then_some(value))
        {
            Some(array) => {
                serde_json::from_value(array).map_err(|e| GatewayError::UpstreamMalformed {
                    message: format!("{}: {}", target, e),
                })?
            }
            None => Vec::new(),
        };

        let mut page = Page::new(
            items,
            collection
                .page
                .as_ref()
                .and_then(|meta| meta.number)
                .unwrap_or(page_index),
        );
        if let Some(total_pages) = collection.page.and_then(|meta| meta.total_pages) {
            page = page.with_total_pages(total_pages);
        }
        Ok(page)
    }

    async fn get_json<D: DeserializeOwned>(&self, url: &Url) -> Result<D> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, HAL_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamUnavailable {
                message: format!("{} returned {}", url, status),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| GatewayError::UpstreamMalformed {
            message: format!("{}: {}", url, e),
        })
    }
}

/// `http://host/stores{?page,size,sort}` → `http://host/stores`
fn strip_uri_template(href: &str) -> &str {
    match href.find('{') {
        Some(index) => &href[..index],
        None => href,
    }
}

fn set_page_param(url: &mut Url, page_index: usize) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (key, value) in &retained {
        pairs.append_pair(key, value);
    }
    pairs.append_pair("page", &page_index.to_string());
}
