//! Per-source circuit breakers.
//!
//! ```text
//! CLOSED --(failure_threshold failures)--> OPEN
//! OPEN   --(recovery_timeout elapsed)----> HALF_OPEN
//! HALF_OPEN --success--> CLOSED
//! HALF_OPEN --failure--> OPEN
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{Result, RiftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    /// Trial requests allowed at once while half-open.
    pub retry_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(900),
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trials_in_flight: u32,
}

/// Failure-tracking state machine for one source.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trials_in_flight: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, moving OPEN to HALF_OPEN if the cooldown has passed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    fn maybe_half_open(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let cooled = inner
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout);
        if cooled {
            info!(source_id = %self.name, "Circuit HALF_OPEN, probing");
            inner.state = CircuitState::HalfOpen;
            inner.trials_in_flight = 0;
        }
    }

    /// Ask to make one request. Fails fast with [`RiftError::CircuitOpen`]
    /// while the circuit is open or all half-open trial slots are taken.
    pub fn acquire(self: &Arc<Self>) -> Result<BreakerPermit> {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self.clone(), false)),
            CircuitState::HalfOpen if inner.trials_in_flight < self.config.retry_attempts => {
                inner.trials_in_flight += 1;
                Ok(BreakerPermit::new(self.clone(), true))
            }
            CircuitState::HalfOpen => Err(RiftError::CircuitOpen {
                source_id: self.name.clone(),
                retry_in: Duration::ZERO,
            }),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map_or(Duration::ZERO, |at| at.elapsed());
                Err(RiftError::CircuitOpen {
                    source_id: self.name.clone(),
                    retry_in: self.config.recovery_timeout.saturating_sub(elapsed),
                })
            }
        }
    }

    /// Run `fut` under the breaker, recording its outcome.
    pub async fn call<F, T>(self: &Arc<Self>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let permit = self.acquire()?;
        match fut.await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(e) => {
                if e.counts_as_source_failure() {
                    permit.fail();
                }
                Err(e)
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                info!(source_id = %self.name, "Circuit CLOSED after a successful trial call");
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trials_in_flight = 0;
            }
            CircuitState::Closed => inner.failure_count = 0,
            // A request that started before the trip; the cooldown stands.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                warn!(
                    source_id = %self.name,
                    failures = inner.failure_count,
                    "Circuit OPEN"
                );
                inner.state = CircuitState::Open;
            }
            CircuitState::HalfOpen => {
                warn!(source_id = %self.name, "Trial call failed, circuit OPEN again");
                inner.state = CircuitState::Open;
                inner.trials_in_flight = 0;
            }
            _ => {}
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.trials_in_flight = 0;
    }

    fn release_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }
}

/// Permission to make one request. Report the outcome with
/// [`succeed`](Self::succeed) or [`fail`](Self::fail); dropping it without
/// either only frees its half-open slot.
#[must_use]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl BreakerPermit {
    fn new(breaker: Arc<CircuitBreaker>, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub source_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Source id → breaker, created on first use so every scraper of a source
/// shares the same breaker.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for `source_id`. `config` only applies
    /// when the breaker is created.
    pub fn get(
        &self,
        source_id: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(source_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    source_id,
                    config.unwrap_or(self.default_config),
                ))
            })
            .clone()
    }

    pub fn states(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| BreakerSnapshot {
                source_id: entry.key().clone(),
                state: entry.state(),
                failure_count: entry.failure_count(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        snapshots
    }

    /// Returns false if no breaker exists for `source_id`.
    pub fn reset(&self, source_id: &str) -> bool {
        match self.breakers.get(source_id) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.reset();
        }
    }
}
