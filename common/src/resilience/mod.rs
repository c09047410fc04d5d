//! Resilience primitives gating outbound collaborators and the HTTP edge:
//! keyed circuit breakers and fixed/sliding-window rate limiters.

pub mod circuit_breaker;
pub mod rate_limit;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter, WindowKind};
