//! Circuit breaker.
//!
//! State machine:
//!
//! ```text
//! Closed --(failure rate > threshold in window)--> Open
//! Open   --(reset_timeout elapsed)---------------> HalfOpen
//! HalfOpen --(trial succeeds)--> Closed
//! HalfOpen --(trial fails)-----> Open
//! ```
//!
//! One breaker guards one upstream. While open, calls fail with
//! `TransportFailure::CircuitOpen` without reaching the inner transport.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::descriptor::RequestDescriptor;
use crate::ports::{Transport, TransportFailure, UpstreamResponse};

/// Breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failure percentage that opens the circuit (strictly exceeded)
    pub error_threshold_percent: u32,
    /// Minimum calls in the window before the rate is evaluated
    pub volume_threshold: u32,
    /// Length of the statistics window
    pub rolling_window: Duration,
    /// Time spent open before a trial call is admitted
    pub reset_timeout: Duration,
    /// Deadline for one guarded call, retries included
    pub call_timeout: Option<Duration>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_percent: 50,
            volume_threshold: 1,
            rolling_window: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(30),
            call_timeout: None,
        }
    }
}

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow through
    Closed,
    /// Calls are rejected
    Open,
    /// One trial call is allowed through
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    calls: u32,
    failures: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            calls: 0,
            failures: 0,
        }
    }

    fn roll(&mut self, now: Instant, length: Duration) {
        if now.duration_since(self.started_at) >= length {
            *self = Window::new(now);
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>,
    window: Window,
}

/// Transport decorator that fails fast while the upstream is unhealthy.
pub struct CircuitBreaker<T> {
    inner: T,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl<T: Transport> CircuitBreaker<T> {
    /// Wrap `inner`, starting closed.
    pub fn new(inner: T, config: BreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(BreakerState {
                circuit: CircuitState::Closed,
                opened_at: None,
                trial_started_at: None,
                window: Window::new(Instant::now()),
            }),
        }
    }

    /// Current state, accounting for an elapsed reset timeout.
    pub fn state(&self) -> CircuitState {
        let state = self.lock();
        match (state.circuit, state.opened_at) {
            (CircuitState::Open, Some(opened_at))
                if opened_at.elapsed() >= self.config.reset_timeout =>
            {
                CircuitState::HalfOpen
            },
            (circuit, _) => circuit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Option<Admission> {
        let mut state = self.lock();
        let now = Instant::now();

        match state.circuit {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let ready = state
                    .opened_at
                    .map_or(true, |at| now.duration_since(at) >= self.config.reset_timeout);
                if !ready {
                    return None;
                }
                state.circuit = CircuitState::HalfOpen;
                state.trial_started_at = Some(now);
                info!("Circuit half-open, admitting trial call");
                Some(Admission::Trial)
            },
            CircuitState::HalfOpen => {
                // A trial abandoned mid-flight must not wedge the breaker
                let stale = state
                    .trial_started_at
                    .map_or(true, |at| now.duration_since(at) >= self.config.reset_timeout);
                if !stale {
                    return None;
                }
                state.trial_started_at = Some(now);
                Some(Admission::Trial)
            },
        }
    }

    fn record(&self, admission: Admission, success: bool) {
        let mut state = self.lock();
        let now = Instant::now();

        if admission == Admission::Trial {
            state.trial_started_at = None;
            if success {
                state.circuit = CircuitState::Closed;
                state.opened_at = None;
                state.window = Window::new(now);
                info!("Circuit closed after successful trial call");
            } else {
                state.circuit = CircuitState::Open;
                state.opened_at = Some(now);
                warn!("Trial call failed, circuit re-opened");
            }
            return;
        }

        state.window.roll(now, self.config.rolling_window);
        state.window.calls += 1;
        if !success {
            state.window.failures += 1;
        }

        let (calls, failures) = (state.window.calls, state.window.failures);
        let rate_exceeded = u64::from(failures) * 100
            > u64::from(self.config.error_threshold_percent) * u64::from(calls);
        let tripped = calls >= self.config.volume_threshold && rate_exceeded;

        if state.circuit == CircuitState::Closed && tripped {
            state.circuit = CircuitState::Open;
            state.opened_at = Some(now);
            warn!(calls, failures, "Circuit opened");
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for CircuitBreaker<T> {
    async fn send(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<UpstreamResponse, TransportFailure> {
        let Some(admission) = self.admit() else {
            return Err(TransportFailure::CircuitOpen);
        };

        let outcome = match self.config.call_timeout {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.inner.send(descriptor)).await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        // Retries already spent the deadline
                        if descriptor.retry.retry_count > 0 {
                            descriptor.retry.exhausted = true;
                        }
                        Err(TransportFailure::Timeout(format!(
                            "call exceeded {}ms",
                            limit.as_millis()
                        )))
                    },
                }
            },
            None => self.inner.send(descriptor).await,
        };

        self.record(admission, outcome.is_ok());
        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
