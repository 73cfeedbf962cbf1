pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliArgs;

pub use crate::adapters::{discovery::StaticRegistry, fetcher::HttpPageFetcher, traversal::HalTraversal};
pub use crate::config::Settings;
pub use crate::core::{aggregator::Aggregator, breaker::BreakerRegistry, service::RecommendationService};
pub use crate::domain::model::{CustomerId, Recommendation, Store, StoreDetails};
pub use crate::utils::error::{GatewayError, Result};
