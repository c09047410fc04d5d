//! Circuit breaker preventing cascading failures against external
//! collaborators. After a threshold of failures within the monitoring
//! period the circuit opens; once the recovery timeout elapses a bounded
//! number of half-open probes decide whether it closes again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::AppError;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within the monitoring period before opening the circuit.
    pub failure_threshold: u32,
    /// Time an open circuit rejects calls before probing.
    pub recovery_timeout: Duration,
    /// Window over which consecutive failures are counted; older failures
    /// reset the count.
    pub monitoring_period: Duration,
    /// Concurrent probes admitted while half-open, and the number of
    /// successes required to close.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::external_api()
    }
}

impl CircuitBreakerConfig {
    pub fn database() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(120),
            half_open_max_calls: 2,
        }
    }

    pub fn external_api() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            monitoring_period: Duration::from_secs(300),
            half_open_max_calls: 3,
        }
    }

    pub fn ai_service() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(180),
            half_open_max_calls: 2,
        }
    }

    pub fn file_storage() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(45),
            monitoring_period: Duration::from_secs(240),
            half_open_max_calls: 3,
        }
    }
}

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests are allowed.
    Closed,
    /// Requests are rejected until the recovery timeout elapses.
    Open,
    /// A bounded number of probe requests is allowed.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    total_calls: u64,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
    half_open_in_flight: u32,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_calls: 0,
            last_failure_time: None,
            next_attempt_time: None,
            half_open_in_flight: 0,
        }
    }
}

/// A single keyed circuit breaker.
pub struct CircuitBreaker {
    key: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    /// Admission check. Open circuits reject with [`AppError::CircuitOpen`];
    /// half-open circuits admit at most `half_open_max_calls` concurrent
    /// probes.
    pub fn try_acquire(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.total_calls += 1;
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let ready = state.next_attempt_time.is_none_or(|t| now >= t);
                if ready {
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    state.half_open_in_flight = 1;
                    Ok(())
                } else {
                    Err(self.rejection(&state, now))
                }
            }
            CircuitState::HalfOpen => {
                if state.half_open_in_flight < self.config.half_open_max_calls {
                    state.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(self.rejection(&state, now))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                if state.success_count >= self.config.half_open_max_calls {
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.next_attempt_time = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => {
                // Failures older than the monitoring period no longer count.
                let within_window = state
                    .last_failure_time
                    .is_some_and(|t| now.duration_since(t) <= self.config.monitoring_period);
                state.failure_count = if within_window {
                    state.failure_count + 1
                } else {
                    1
                };
                state.last_failure_time = Some(now);

                if state.failure_count >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.next_attempt_time = Some(now + self.config.recovery_timeout);
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.half_open_in_flight = 0;
                state.last_failure_time = Some(now);
                state.next_attempt_time = Some(now + self.config.recovery_timeout);
            }
            CircuitState::Open => {
                state.last_failure_time = Some(now);
            }
        }
    }

    /// Run a fallible async operation under the breaker.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, AppError>>,
    {
        self.try_acquire()?;
        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    pub fn current_state(&self) -> CircuitState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    pub fn failure_count(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failure_count
    }

    fn rejection(&self, state: &BreakerState, now: Instant) -> AppError {
        let retry_after_ms = state
            .next_attempt_time
            .map(|t| t.saturating_duration_since(now).as_millis() as u64)
            .unwrap_or_else(|| self.config.recovery_timeout.as_millis() as u64);
        AppError::CircuitOpen {
            key: self.key.clone(),
            retry_after_ms,
        }
    }
}

/// Keyed registry, one breaker per collaborator key. State is retained for
/// the life of the process; entries are never evicted inside
/// `monitoring_period + recovery_timeout`, so failure history cannot be
/// lost across a window boundary.
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            default_config,
        }
    }

    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with_config(key, self.default_config)
    }

    pub fn get_or_create_with_config(
        &self,
        key: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            breakers
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(key, config))),
        )
    }

    pub fn snapshot(&self) -> Vec<(String, CircuitState, u32)> {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers
            .iter()
            .map(|(key, breaker)| (key.clone(), breaker.current_state(), breaker.failure_count()))
            .collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
