use crate::domain::ports::ServiceDiscovery;
use crate::utils::error::{GatewayError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

#[derive(Debug)]
struct Instances {
    urls: Vec<Url>,
    next: AtomicUsize,
}

/// Statically configured service registry. Names are case-insensitive and
/// instances are handed out round-robin.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    services: HashMap<String, Instances>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_services(services: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut registry = Self::new();
        for (name, urls) in services {
            for url in urls {
                registry.register(name, url)?;
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, service_name: &str, url: &str) -> Result<()> {
        let mut parsed = Url::parse(url).map_err(|e| GatewayError::InvalidConfigValueError {
            field: format!("services.{}", service_name),
            value: url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        // 基底 URL 以斜線結尾，後續 join 才不會吃掉最後一段路徑
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        self.services
            .entry(service_name.to_ascii_uppercase())
            .or_insert_with(|| Instances {
                urls: Vec::new(),
                next: AtomicUsize::new(0),
            })
            .urls
            .push(parsed);
        Ok(())
    }
}

impl ServiceDiscovery for StaticRegistry {
    fn resolve(&self, service_name: &str) -> Result<Url> {
        let instances = self
            .services
            .get(&service_name.to_ascii_uppercase())
            .filter(|instances| !instances.urls.is_empty())
            .ok_or_else(|| GatewayError::ServiceNotFound {
                service: service_name.to_string(),
            })?;

        let index = instances.next.fetch_add(1, Ordering::Relaxed) % instances.urls.len();
        Ok(instances.urls[index].clone())
    }
}
