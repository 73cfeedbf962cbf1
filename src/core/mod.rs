pub mod aggregator;
pub mod breaker;
pub mod deadline;
pub mod paginator;
pub mod result_sink;
pub mod resilient_call;
pub mod service;

pub use crate::domain::model::{CallOutcome, FailureKind, Page, Recommendation, Store, StoreDetails};
pub use crate::domain::ports::{PageFetcher, ResourcePath, ServiceDiscovery};
pub use crate::utils::error::Result;
