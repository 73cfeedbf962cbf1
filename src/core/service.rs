use crate::core::aggregator::Aggregator;
use crate::core::breaker::{BreakerRegistry, BreakerStats};
use crate::core::result_sink::{ResultSink, SinkReceiver};
use crate::domain::model::{CustomerId, Recommendation, Store, StoreDetails};
use crate::domain::ports::PageFetcher;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Request entry point: validates the customer id, runs the aggregation on
/// its own task and hands the caller a receiver that resolves exactly once.
pub struct RecommendationService<S, R> {
    aggregator: Arc<Aggregator<S, R>>,
    registry: Arc<BreakerRegistry>,
}

impl<S, R> RecommendationService<S, R>
where
    S: PageFetcher<Store> + 'static,
    R: PageFetcher<Recommendation> + 'static,
{
    pub fn new(aggregator: Aggregator<S, R>, registry: Arc<BreakerRegistry>) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            registry,
        }
    }

    pub fn recommend(&self, customer_id: &str) -> SinkReceiver<Vec<StoreDetails>> {
        let (sink, receiver) = ResultSink::channel();

        let customer_id = match CustomerId::new(customer_id) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "rejecting recommendation request");
                let _ = sink.resolve_error(err);
                return receiver;
            }
        };

        let aggregator = Arc::clone(&self.aggregator);
        tokio::spawn(async move {
            let started = Instant::now();
            tracing::info!(customer = %customer_id, "🔍 aggregating recommendations");

            let details = aggregator.run(&customer_id).await;
            tracing::info!(
                customer = %customer_id,
                stores = details.len(),
                recommendations = details.iter().map(|d| d.recommendations.len()).sum::<usize>(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "✅ aggregation finished"
            );
            let _ = sink.resolve(details);
        }
        .in_current_span());

        receiver
    }

    pub fn breakers(&self) -> Vec<BreakerStats> {
        self.registry.snapshot()
    }
}
