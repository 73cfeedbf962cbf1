// Adapters layer: concrete implementations for external systems (discovery, HAL over HTTP, inbound server).

pub mod discovery;
pub mod fetcher;
pub mod server;
pub mod traversal;
