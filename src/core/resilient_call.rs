use crate::core::breaker::BreakerRegistry;
use crate::domain::model::{CallOutcome, FailureKind};
use crate::utils::error::{GatewayError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Runs single downstream calls behind a keyed circuit breaker, a per-call
/// timeout and an optional fallback value.
#[derive(Debug, Clone)]
pub struct ResilientCall {
    registry: Arc<BreakerRegistry>,
    per_call_timeout: Duration,
}

impl ResilientCall {
    pub fn new(registry: Arc<BreakerRegistry>, per_call_timeout: Duration) -> Self {
        Self {
            registry,
            per_call_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    pub async fn invoke<T, F, Fut>(
        &self,
        breaker_key: &str,
        cancel: &CancellationToken,
        fallback: Option<T>,
        call: F,
    ) -> CallOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return recover(fallback, FailureKind::Cancelled, "cancelled before start");
        }

        let breaker = self.registry.get(breaker_key);
        let Some(permit) = breaker.try_acquire() else {
            tracing::debug!(breaker = breaker_key, "circuit open, short-circuiting to fallback");
            return recover(fallback, FailureKind::ShortCircuited, "circuit open");
        };

        let started = Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            outcome = tokio::time::timeout(self.per_call_timeout, call()) => match outcome {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout { elapsed: started.elapsed() }),
            },
        };

        let err = match result {
            Ok(value) => {
                permit.record_success();
                return CallOutcome::Success(value);
            }
            Err(err) => err,
        };

        let kind = err
            .failure_kind()
            .unwrap_or(FailureKind::UpstreamUnavailable);
        if kind.counts_toward_breaker() {
            permit.record_failure();
        } else {
            permit.release();
        }

        match kind {
            FailureKind::UpstreamMalformed => tracing::error!(
                breaker = breaker_key,
                error = %err,
                "downstream contract broken, payload could not be decoded"
            ),
            FailureKind::Cancelled => {
                tracing::debug!(breaker = breaker_key, "call cancelled")
            }
            _ => tracing::warn!(
                breaker = breaker_key,
                kind = %kind,
                error = %err,
                "downstream call failed"
            ),
        }

        recover(fallback, kind, err.to_string())
    }
}

fn recover<T>(fallback: Option<T>, kind: FailureKind, cause: impl Into<String>) -> CallOutcome<T> {
    match fallback {
        Some(value) => CallOutcome::FallbackUsed { value, kind },
        None => CallOutcome::Failure {
            kind,
            cause: cause.into(),
        },
    }
}
