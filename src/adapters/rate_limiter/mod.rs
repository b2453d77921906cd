//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port for different backends.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - process-local windows for tests and single-instance use
//! - `RedisRateLimiter` - shared windows for multi-instance deployments
//! - `FallbackRateLimiter` - Redis first, local counting while Redis is down
//!
//! ## Usage
//!
//! ```ignore
//! use practice_entitlements::adapters::rate_limiter::{
//!     FallbackRateLimiter, RateLimitPolicies, RedisRateLimiter,
//! };
//!
//! let redis = RedisRateLimiter::connect("redis://localhost:6379").await?;
//! let limiter = FallbackRateLimiter::new(Arc::new(redis));
//! let window = RateLimitPolicies::default().attempt_create.window();
//! ```

mod config;
mod dual;
mod fallback;
mod in_memory;
mod redis;

pub use config::{PolicyLimits, RateLimitPolicies, ATTEMPT_CREATE};
pub use dual::check_user_and_ip;
pub use fallback::FallbackRateLimiter;
pub use in_memory::InMemoryRateLimiter;
pub use redis::RedisRateLimiter;
