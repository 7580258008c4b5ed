//! Per-dependency circuit breaker
//!
//! Closed → (threshold consecutive failures) → Open → (cooldown) → HalfOpen.
//! In HalfOpen exactly one trial call is let through; its success closes the
//! circuit, its failure re-opens it for another cooldown. Every other caller
//! fails fast with [`RatingsError::CircuitOpen`] without running its operation.
//!
//! State lives behind one mutex per dependency and the lock is never held
//! across an `.await`.

use crate::error::{RatingsError, RatingsResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker thresholds (see `[circuit]` config section)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a trial call
    pub cooldown_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

impl CircuitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of one dependency's circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Circuit {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }
}

/// Registry of circuits keyed by dependency name
///
/// Circuits are created lazily on first use. Share one breaker across all
/// concurrent resolutions (wrap in `Arc`).
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    circuits: RwLock<HashMap<String, Arc<Mutex<Circuit>>>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    /// Run `operation` through the named circuit
    ///
    /// Fails fast with `CircuitOpen` while the circuit is open or while a
    /// half-open trial is already in flight. The operation's own error is
    /// returned unchanged after being counted.
    pub async fn execute<F, Fut, T>(&self, dependency: &str, operation: F) -> RatingsResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RatingsResult<T>>,
    {
        let permit = self.acquire(dependency)?;

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(e) => {
                permit.fail();
                Err(e)
            }
        }
    }

    /// True when a call would currently fail fast
    pub fn is_open(&self, dependency: &str) -> bool {
        let circuit = self.circuit(dependency);
        let guard = lock(&circuit);
        match guard.state {
            CircuitState::Closed => false,
            CircuitState::Open => !self.cooldown_elapsed(&guard),
            CircuitState::HalfOpen => guard.trial_in_flight,
        }
    }

    pub fn snapshot(&self, dependency: &str) -> CircuitSnapshot {
        let circuit = self.circuit(dependency);
        let guard = lock(&circuit);
        CircuitSnapshot {
            state: guard.state,
            consecutive_failures: guard.consecutive_failures,
            opened_at: guard.opened_at,
        }
    }

    /// Force a circuit back to closed
    pub fn reset(&self, dependency: &str) {
        let circuit = self.circuit(dependency);
        *lock(&circuit) = Circuit::closed();
        info!(dependency = %dependency, "Circuit reset");
    }

    fn acquire(&self, dependency: &str) -> RatingsResult<CallPermit> {
        let circuit = self.circuit(dependency);
        let trial = {
            let mut guard = lock(&circuit);
            match guard.state {
                CircuitState::Closed => false,
                CircuitState::Open if self.cooldown_elapsed(&guard) => {
                    guard.state = CircuitState::HalfOpen;
                    guard.trial_in_flight = true;
                    info!(dependency = %dependency, "Circuit half-open, allowing trial call");
                    true
                }
                CircuitState::HalfOpen if !guard.trial_in_flight => {
                    guard.trial_in_flight = true;
                    true
                }
                CircuitState::Open | CircuitState::HalfOpen => {
                    return Err(RatingsError::CircuitOpen {
                        dependency: dependency.to_string(),
                    })
                }
            }
        };

        Ok(CallPermit {
            circuit,
            dependency: dependency.to_string(),
            threshold: self.config.failure_threshold.max(1),
            trial,
            settled: false,
        })
    }

    fn cooldown_elapsed(&self, circuit: &Circuit) -> bool {
        circuit
            .opened_at
            .map(|at| at.elapsed() >= self.config.cooldown())
            .unwrap_or(true)
    }

    fn circuit(&self, dependency: &str) -> Arc<Mutex<Circuit>> {
        {
            let circuits = self.circuits.read().unwrap_or_else(|e| e.into_inner());
            if let Some(circuit) = circuits.get(dependency) {
                return Arc::clone(circuit);
            }
        }

        let mut circuits = self.circuits.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            circuits
                .entry(dependency.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Circuit::closed()))),
        )
    }
}

/// Admission for one call; settles the circuit when resolved
///
/// A permit dropped without being settled (the caller's future was
/// abandoned) releases a half-open trial as a failure so the circuit cannot
/// stay stuck half-open. Abandoned closed-state calls are not counted.
struct CallPermit {
    circuit: Arc<Mutex<Circuit>>,
    dependency: String,
    threshold: u32,
    trial: bool,
    settled: bool,
}

impl CallPermit {
    fn succeed(mut self) {
        self.settled = true;
        let mut guard = lock(&self.circuit);
        if self.trial {
            info!(dependency = %self.dependency, "Trial call succeeded, circuit closed");
            *guard = Circuit::closed();
        } else if guard.state == CircuitState::Closed {
            guard.consecutive_failures = 0;
        }
    }

    fn fail(mut self) {
        self.settled = true;
        self.record_failure();
    }

    fn record_failure(&self) {
        let mut guard = lock(&self.circuit);
        guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);

        if self.trial {
            warn!(dependency = %self.dependency, "Trial call failed, circuit re-opened");
            guard.open(Instant::now());
        } else if guard.state == CircuitState::Closed && guard.consecutive_failures >= self.threshold {
            warn!(
                dependency = %self.dependency,
                failures = guard.consecutive_failures,
                "Circuit opened"
            );
            guard.open(Instant::now());
        }
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.record_failure();
        }
    }
}

fn lock(circuit: &Mutex<Circuit>) -> MutexGuard<'_, Circuit> {
    circuit.lock().unwrap_or_else(|e| e.into_inner())
}
