use crate::config::AggregationSettings;
use crate::core::breaker::BreakerRegistry;
use crate::core::deadline::{DeadlineGate, GateOutcome};
use crate::core::paginator::Paginator;
use crate::core::resilient_call::ResilientCall;
use crate::domain::model::{CustomerId, Recommendation, Store, StoreDetails};
use crate::domain::ports::{PageFetcher, ResourcePath};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub const STORES_SERVICE: &str = "CUSTOMERS";
pub const RECOMMENDATIONS_SERVICE: &str = "RECOMMENDATIONS";
pub const STORES_BREAKER: &str = "stores-lookup";
pub const RECOMMENDATIONS_BREAKER: &str = "recommendations-lookup";

const STORES_RELATION: &str = "stores-nearby";
const RECOMMENDATIONS_RELATION: &str = "recommendations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Append {
    Accepted,
    WrongOwner,
    Closed,
}

/// 組裝中的單一店家結果，關閉後不再接受任何推薦
#[derive(Debug)]
struct AggregateSlot {
    store: Store,
    recommendations: Mutex<Vec<Recommendation>>,
    accepting: AtomicBool,
}

impl AggregateSlot {
    fn new(store: Store) -> Self {
        Self {
            store,
            recommendations: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
        }
    }

    fn append(&self, recommendation: Recommendation) -> Append {
        let mut recommendations = self.recommendations.lock();
        if !self.accepting.load(Ordering::Acquire) {
            return Append::Closed;
        }
        if recommendation.store_id != self.store.id {
            tracing::warn!(
                store = %self.store.id,
                owner = %recommendation.store_id,
                recommendation = %recommendation.id,
                "dropping recommendation that belongs to another store"
            );
            return Append::WrongOwner;
        }
        recommendations.push(recommendation);
        Append::Accepted
    }

    fn close(&self) {
        let _guard = self.recommendations.lock();
        self.accepting.store(false, Ordering::Release);
    }

    fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    fn finish(&self) -> StoreDetails {
        let recommendations = self.recommendations.lock();
        self.accepting.store(false, Ordering::Release);
        StoreDetails {
            store: self.store.clone(),
            recommendations: recommendations.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BatchPolicy {
    window: Duration,
    cap: usize,
    max_pages: usize,
}

/// Fans out from the nearby-stores listing to one recommendations fetch per
/// store and joins the results under a request deadline.
pub struct Aggregator<S, R> {
    stores: Paginator<S>,
    recommendations: Paginator<R>,
    settings: AggregationSettings,
    shutdown: CancellationToken,
}

impl<S, R> Aggregator<S, R>
where
    S: PageFetcher<Store> + 'static,
    R: PageFetcher<Recommendation> + 'static,
{
    pub fn new(
        stores: Arc<S>,
        recommendations: Arc<R>,
        registry: Arc<BreakerRegistry>,
        settings: AggregationSettings,
    ) -> Self {
        let resilient = ResilientCall::new(registry, settings.per_call_timeout());
        Self {
            stores: Paginator::new(stores, resilient.clone(), STORES_BREAKER),
            recommendations: Paginator::new(recommendations, resilient, RECOMMENDATIONS_BREAKER),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling `shutdown` also cuts every in-flight run short.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn run(&self, customer_id: &CustomerId) -> Vec<StoreDetails> {
        self.run_with_budget(customer_id, self.settings.request_deadline())
            .await
    }

    pub async fn run_with_budget(
        &self,
        customer_id: &CustomerId,
        budget: Duration,
    ) -> Vec<StoreDetails> {
        let gate = DeadlineGate::with_parent(budget, &self.shutdown);
        let mut slots: Vec<Arc<AggregateSlot>> = Vec::new();

        let outcome = gate
            .run(self.collect(customer_id, &mut slots, gate.token()))
            .await;

        let pending = slots.iter().filter(|slot| slot.is_accepting()).count();
        match outcome {
            GateOutcome::Completed(()) => {
                tracing::debug!(customer = %customer_id, stores = slots.len(), "aggregation completed")
            }
            GateOutcome::Expired { elapsed } => tracing::warn!(
                customer = %customer_id,
                stores = slots.len(),
                pending,
                elapsed_ms = elapsed.as_millis() as u64,
                "deadline reached, returning partial results"
            ),
            GateOutcome::Cancelled => tracing::info!(
                customer = %customer_id,
                stores = slots.len(),
                pending,
                "aggregation cancelled by shutdown"
            ),
        }

        slots.iter().map(|slot| slot.finish()).collect()
    }

    async fn collect(
        &self,
        customer_id: &CustomerId,
        slots: &mut Vec<Arc<AggregateSlot>>,
        cancel: CancellationToken,
    ) {
        let resource = ResourcePath::new(format!("customers/{}", customer_id), STORES_RELATION);
        let mut cursor = self.stores.paginate::<Store>(
            STORES_SERVICE,
            resource,
            self.settings.max_pages,
            cancel.clone(),
        );

        let policy = BatchPolicy {
            window: self.settings.detail_batch_window(),
            cap: self.settings.detail_batch_cap,
            max_pages: self.settings.max_pages,
        };
        let mut seen = HashSet::new();
        // JoinSet 被丟棄時會中止所有尚未完成的子任務
        let mut details = JoinSet::new();

        while let Some(store) = cursor.next().await {
            if !seen.insert(store.id.clone()) {
                tracing::debug!(store = %store.id, "skipping duplicate store from pagination");
                continue;
            }
            let slot = Arc::new(AggregateSlot::new(store));
            slots.push(Arc::clone(&slot));
            details.spawn(fetch_recommendations(
                self.recommendations.clone(),
                slot,
                policy,
                cancel.clone(),
            )
            .in_current_span());
        }

        tracing::debug!(
            customer = %customer_id,
            stores = slots.len(),
            pages = cursor.pages_fetched(),
            "store discovery finished"
        );

        while let Some(joined) = details.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(error = %e, "recommendation task panicked");
                }
            }
        }
    }
}

async fn fetch_recommendations<R>(
    paginator: Paginator<R>,
    slot: Arc<AggregateSlot>,
    policy: BatchPolicy,
    cancel: CancellationToken,
) where
    R: PageFetcher<Recommendation>,
{
    let resource = ResourcePath::new(
        format!("stores/{}", slot.store.id),
        RECOMMENDATIONS_RELATION,
    );
    let mut cursor = paginator.paginate::<Recommendation>(
        RECOMMENDATIONS_SERVICE,
        resource,
        policy.max_pages,
        cancel,
    );

    let window_end = tokio::time::Instant::now() + policy.window;
    let mut collected = 0;
    while collected < policy.cap {
        match tokio::time::timeout_at(window_end, cursor.next()).await {
            Ok(Some(recommendation)) => match slot.append(recommendation) {
                Append::Accepted => collected += 1,
                Append::WrongOwner => {}
                Append::Closed => break,
            },
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(store = %slot.store.id, collected, "batch window elapsed");
                break;
            }
        }
    }

    // 批次送出後不再合併遲到的推薦
    slot.close();
    tracing::debug!(store = %slot.store.id, collected, "recommendations assembled");
}
