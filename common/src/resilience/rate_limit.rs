//! Distributed-shape rate limiting with fixed and sliding window variants.
//!
//! Counters live behind the limiter's internal store keyed the same way a
//! shared cache would be (`rate_limit:{subject}:{window}` for fixed windows,
//! a per-subject timestamp set for sliding), so the edge semantics carry
//! over unchanged if the store is swapped for a networked cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Fixed,
    Sliding,
}

/// Configuration for a rate-limit tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window: Duration,
    pub kind: WindowKind,
}

impl RateLimitConfig {
    /// Per-tenant tier: 1000 requests / 15 minutes.
    pub fn tenant() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::from_secs(15 * 60),
            kind: WindowKind::Fixed,
        }
    }

    /// Per-user tier: 100 requests / 15 minutes.
    pub fn user() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            kind: WindowKind::Sliding,
        }
    }

    /// Global tier: 10000 requests / minute.
    pub fn global() -> Self {
        Self {
            max_requests: 10_000,
            window: Duration::from_secs(60),
            kind: WindowKind::Fixed,
        }
    }

    /// Per-API-key tier: 1000 requests / minute.
    pub fn api_key() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::from_secs(60),
            kind: WindowKind::Sliding,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub retry_after: Option<Duration>,
}

enum SubjectState {
    Fixed { window_index: u64, count: u64 },
    Sliding { timestamps: VecDeque<Instant> },
}

/// One rate-limit tier. Subjects are tenant ids, user ids or API keys
/// depending on the tier the limiter was built for.
pub struct RateLimiter {
    config: RateLimitConfig,
    epoch: Instant,
    subjects: Mutex<HashMap<String, SubjectState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            epoch: Instant::now(),
            subjects: Mutex::new(HashMap::new()),
        }
    }

    /// Record-and-check: consumes one slot when allowed.
    pub fn check(&self, subject: &str) -> RateLimitDecision {
        match self.config.kind {
            WindowKind::Fixed => self.check_fixed(subject),
            WindowKind::Sliding => self.check_sliding(subject),
        }
    }

    /// Check that maps a denial onto [`AppError::RateLimited`].
    pub fn enforce(&self, subject: &str) -> Result<(), AppError> {
        let decision = self.check(subject);
        if decision.allowed {
            Ok(())
        } else {
            Err(AppError::RateLimited(format!(
                "subject {subject} exceeded {} requests per {:?}",
                self.config.max_requests, self.config.window
            )))
        }
    }

    fn check_fixed(&self, subject: &str) -> RateLimitDecision {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.epoch).as_millis() as u64;
        let window_ms = self.config.window.as_millis().max(1) as u64;
        let window_index = elapsed_ms / window_ms;

        let mut subjects = self.subjects.lock().unwrap_or_else(|e| e.into_inner());
        let state = subjects
            .entry(subject.to_string())
            .or_insert(SubjectState::Fixed {
                window_index,
                count: 0,
            });

        let SubjectState::Fixed {
            window_index: current_window,
            count,
        } = state
        else {
            // A subject never changes kind within one limiter.
            *state = SubjectState::Fixed {
                window_index,
                count: 0,
            };
            return self.check_fixed(subject);
        };

        // Counter expires with the window.
        if *current_window != window_index {
            *current_window = window_index;
            *count = 0;
        }

        if *count < self.config.max_requests {
            *count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests - *count,
                retry_after: None,
            }
        } else {
            let window_end_ms = (window_index + 1) * window_ms;
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after: Some(Duration::from_millis(
                    window_end_ms.saturating_sub(elapsed_ms),
                )),
            }
        }
    }

    fn check_sliding(&self, subject: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut subjects = self.subjects.lock().unwrap_or_else(|e| e.into_inner());
        let state = subjects
            .entry(subject.to_string())
            .or_insert(SubjectState::Sliding {
                timestamps: VecDeque::new(),
            });

        let SubjectState::Sliding { timestamps } = state else {
            *state = SubjectState::Sliding {
                timestamps: VecDeque::new(),
            };
            return self.check_sliding(subject);
        };

        // Evict entries older than the window.
        while timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.config.window)
        {
            timestamps.pop_front();
        }

        if (timestamps.len() as u64) < self.config.max_requests {
            timestamps.push_back(now);
            RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests - timestamps.len() as u64,
                retry_after: None,
            }
        } else {
            let retry_after = timestamps.front().map(|oldest| {
                self.config
                    .window
                    .saturating_sub(now.duration_since(*oldest))
            });
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after,
            }
        }
    }
}
