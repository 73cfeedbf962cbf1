use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome<T> {
    Completed(T),
    Expired { elapsed: Duration },
    /// The parent token fired before the budget ran out.
    Cancelled,
}

/// Bounds a unit of work by wall-clock time. Whatever happens, the gate's
/// token is cancelled once `run` returns so stragglers stop.
#[derive(Debug)]
pub struct DeadlineGate {
    budget: Duration,
    token: CancellationToken,
}

impl DeadlineGate {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            token: CancellationToken::new(),
        }
    }

    /// The gate also fires when `parent` is cancelled (e.g. server shutdown).
    pub fn with_parent(budget: Duration, parent: &CancellationToken) -> Self {
        Self {
            budget,
            token: parent.child_token(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn run<F>(&self, work: F) -> GateOutcome<F::Output>
    where
        F: Future,
    {
        let started = Instant::now();
        let outcome = tokio::select! {
            output = work => GateOutcome::Completed(output),
            _ = tokio::time::sleep(self.budget) => GateOutcome::Expired {
                elapsed: started.elapsed(),
            },
            _ = self.token.cancelled() => GateOutcome::Cancelled,
        };
        self.token.cancel();
        outcome
    }
}
