//! Circuit breakers keyed by logical downstream operation.
//!
//! State transitions:
//! - Closed → Open: failure rate within the rolling window reaches the
//!   threshold, once at least `minimum_calls` outcomes were recorded
//! - Open → HalfOpen: after `cooldown`
//! - HalfOpen → Closed: the single trial call succeeds
//! - HalfOpen → Open: the trial call fails, cooldown restarts

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Fraction of failed calls in the window that opens the circuit
    pub failure_rate_threshold: f64,
    /// Outcomes required in the window before the rate is evaluated
    pub minimum_calls: u32,
    /// Rolling window for outcome accounting
    pub window: Duration,
    /// Time spent Open before a trial call is let through
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            minimum_calls: 20,
            window: Duration::from_secs(10),
            cooldown: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitBreakerState,
    state_changed_at: Instant,
    /// (recorded at, failed)
    outcomes: VecDeque<(Instant, bool)>,
    trial_in_flight: bool,
    total_failures: u64,
    total_short_circuits: u64,
    opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerInner {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&(recorded_at, _)) = self.outcomes.front() {
            if now.duration_since(recorded_at) < window {
                break;
            }
            self.outcomes.pop_front();
        }
    }

    fn failures_in_window(&self) -> usize {
        self.outcomes.iter().filter(|(_, failed)| *failed).count()
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitBreakerState::Open;
        self.state_changed_at = now;
        self.trial_in_flight = false;
        self.opened_at = Some(Utc::now());
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitBreakerInner>,
}

/// Admission ticket for one call. Dropping it unsettled releases a HalfOpen
/// trial slot without recording an outcome.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl BreakerPermit {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }

    /// Settles the call without counting it, e.g. on cancellation.
    pub fn release(mut self) {
        self.settled = true;
        self.breaker.on_release(self.trial);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_release(self.trial);
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CircuitBreakerInner {
                state: CircuitBreakerState::Closed,
                state_changed_at: Instant::now(),
                outcomes: VecDeque::new(),
                trial_in_flight: false,
                total_failures: 0,
                total_short_circuits: 0,
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.inner.lock().state
    }

    /// Asks for permission to run one call. `None` means short-circuit.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitBreakerState::Open {
            if inner.state_changed_at.elapsed() >= self.config.cooldown {
                debug!(breaker = %self.name, "transitioning from Open to HalfOpen");
                inner.state = CircuitBreakerState::HalfOpen;
                inner.state_changed_at = Instant::now();
                inner.trial_in_flight = false;
            } else {
                inner.total_short_circuits += 1;
                return None;
            }
        }

        let trial = match inner.state {
            CircuitBreakerState::Closed => false,
            CircuitBreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                true
            }
            _ => {
                inner.total_short_circuits += 1;
                return None;
            }
        };

        Some(BreakerPermit {
            breaker: Arc::clone(self),
            trial,
            settled: false,
        })
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.state {
            CircuitBreakerState::HalfOpen if trial => {
                debug!(breaker = %self.name, "trial call succeeded, closing circuit");
                inner.state = CircuitBreakerState::Closed;
                inner.state_changed_at = now;
                inner.trial_in_flight = false;
                inner.outcomes.clear();
            }
            CircuitBreakerState::Closed => {
                inner.outcomes.push_back((now, false));
                inner.prune(now, self.config.window);
            }
            // 斷路器在呼叫進行中已經跳開，結果不再計入
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.total_failures += 1;

        match inner.state {
            CircuitBreakerState::HalfOpen if trial => {
                warn!(breaker = %self.name, "trial call failed, reopening circuit");
                inner.open(now);
            }
            CircuitBreakerState::Closed => {
                inner.outcomes.push_back((now, true));
                inner.prune(now, self.config.window);

                let calls = inner.outcomes.len();
                let failures = inner.failures_in_window();
                let rate = failures as f64 / calls as f64;
                if calls >= self.config.minimum_calls as usize
                    && rate >= self.config.failure_rate_threshold
                {
                    warn!(
                        breaker = %self.name,
                        calls,
                        failures,
                        threshold = self.config.failure_rate_threshold,
                        "failure rate exceeded, opening circuit"
                    );
                    inner.open(now);
                }
            }
            _ => {}
        }
    }

    fn on_release(&self, trial: bool) {
        if !trial {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.state == CircuitBreakerState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    /// Force the breaker back to Closed and forget the window.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        debug!(breaker = %self.name, "manually resetting circuit breaker");
        inner.state = CircuitBreakerState::Closed;
        inner.state_changed_at = Instant::now();
        inner.outcomes.clear();
        inner.trial_in_flight = false;
    }

    pub fn stats(&self) -> BreakerStats {
        let mut inner = self.inner.lock();
        inner.prune(Instant::now(), self.config.window);
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            calls_in_window: inner.outcomes.len(),
            failures_in_window: inner.failures_in_window(),
            total_failures: inner.total_failures,
            total_short_circuits: inner.total_short_circuits,
            opened_at: inner.opened_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitBreakerState,
    pub calls_in_window: usize,
    pub failures_in_window: usize,
    pub total_failures: u64,
    pub total_short_circuits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
}

/// Process-wide breakers, one per key. Each breaker carries its own lock so
/// distinct keys never contend on breaker state.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Install a breaker with its own configuration, replacing any existing one.
    pub fn register(&self, key: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::new(key, config));
        self.breakers
            .write()
            .insert(key.to_string(), Arc::clone(&breaker));
        breaker
    }

    pub fn get(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(key) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        let breaker = breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.default_config.clone())));
        Arc::clone(breaker)
    }

    pub fn snapshot(&self) -> Vec<BreakerStats> {
        let mut stats: Vec<BreakerStats> = self
            .breakers
            .read()
            .values()
            .map(|breaker| breaker.stats())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(minimum_calls: u32, cooldown_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 0.5,
            minimum_calls,
            window: Duration::from_secs(60),
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }

    fn fail(cb: &Arc<CircuitBreaker>) {
        cb.try_acquire().expect("closed breaker admits calls").record_failure();
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = Arc::new(CircuitBreaker::new("test", config(3, 100)));

        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitBreakerState::Closed);

        fail(&cb);
        assert_eq!(cb.state(), CircuitBreakerState::Open);
        assert!(cb.try_acquire().is_none());
        assert_eq!(cb.stats().total_short_circuits, 1);
    }

    #[test]
    fn test_rate_below_threshold_stays_closed() {
        let cb = Arc::new(CircuitBreaker::new("test", config(4, 100)));

        for _ in 0..3 {
            cb.try_acquire().unwrap().record_success();
        }
        fail(&cb);
        assert_eq!(cb.state(), CircuitBreakerState::Closed);

        let stats = cb.stats();
        assert_eq!(stats.calls_in_window, 4);
        assert_eq!(stats.failures_in_window, 1);
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let cb = Arc::new(CircuitBreaker::new("test", config(1, 20)));
        fail(&cb);
        assert_eq!(cb.state(), CircuitBreakerState::Open);

        std::thread::sleep(Duration::from_millis(30));

        let trial = cb.try_acquire().expect("cooldown elapsed");
        assert!(trial.is_trial());
        assert_eq!(cb.state(), CircuitBreakerState::HalfOpen);
        assert!(cb.try_acquire().is_none());

        trial.record_success();
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
        assert_eq!(cb.stats().calls_in_window, 0);
    }

    #[test]
    fn test_failed_trial_reopens() {
        let cb = Arc::new(CircuitBreaker::new("test", config(1, 20)));
        fail(&cb);
        std::thread::sleep(Duration::from_millis(30));

        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitBreakerState::Open);
        // 冷卻時間重新計算
        assert!(cb.try_acquire().is_none());
    }

    #[test]
    fn test_dropped_trial_frees_slot() {
        let cb = Arc::new(CircuitBreaker::new("test", config(1, 20)));
        fail(&cb);
        std::thread::sleep(Duration::from_millis(30));

        let trial = cb.try_acquire().unwrap();
        drop(trial);
        assert_eq!(cb.state(), CircuitBreakerState::HalfOpen);
        assert!(cb.try_acquire().is_some());
    }

    #[test]
    fn test_reset() {
        let cb = Arc::new(CircuitBreaker::new("test", config(1, 60_000)));
        fail(&cb);
        assert_eq!(cb.state(), CircuitBreakerState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
        assert_eq!(cb.stats().total_failures, 1);
    }

    #[test]
    fn test_registry_shares_breaker_per_key() {
        let registry = BreakerRegistry::new(config(1, 60_000));
        let a = registry.get("stores-lookup");
        let b = registry.get("stores-lookup");
        assert!(Arc::ptr_eq(&a, &b));

        fail(&a);
        assert_eq!(b.state(), CircuitBreakerState::Open);
        assert_eq!(
            registry.get("recommendations-lookup").state(),
            CircuitBreakerState::Closed
        );

        let names: Vec<String> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["recommendations-lookup", "stores-lookup"]);
    }
}
