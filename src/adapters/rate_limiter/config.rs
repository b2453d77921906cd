//! Rate limit policy configuration.
//!
//! Named per-action windows. Defaults match production traffic; every value
//! can be overridden through `ENTITLEMENTS__RATE_LIMITS__*`.

use serde::{Deserialize, Serialize};

use crate::ports::WindowLimit;

/// Action name for attempt creation counters.
pub const ATTEMPT_CREATE: &str = "attempt_create";

/// Window settings for a single counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyLimits {
    /// Maximum requests per window.
    pub requests_per_window: u32,
    /// Window duration in seconds.
    pub window_secs: u64,
}

impl PolicyLimits {
    pub const fn new(requests_per_window: u32, window_secs: u64) -> Self {
        Self {
            requests_per_window,
            window_secs,
        }
    }

    pub fn window(&self) -> WindowLimit {
        WindowLimit::per_secs(self.requests_per_window, self.window_secs)
    }
}

/// Complete rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicies {
    /// Per-subscriber window for attempt creation.
    #[serde(default = "default_attempt_create")]
    pub attempt_create: PolicyLimits,
    /// Per-origin window for attempt creation. Several subscribers can share
    /// one address, so this is wider than the subscriber window.
    #[serde(default = "default_attempt_create_ip")]
    pub attempt_create_ip: PolicyLimits,
}

fn default_attempt_create() -> PolicyLimits {
    PolicyLimits::new(20, 60)
}

fn default_attempt_create_ip() -> PolicyLimits {
    PolicyLimits::new(60, 60)
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            attempt_create: default_attempt_create(),
            attempt_create_ip: default_attempt_create_ip(),
        }
    }
}

impl RateLimitPolicies {
    /// Rejects windows that would never admit or never expire.
    pub fn validate(&self) -> Result<(), String> {
        for (name, limits) in [
            ("attempt_create", &self.attempt_create),
            ("attempt_create_ip", &self.attempt_create_ip),
        ] {
            if limits.requests_per_window == 0 {
                return Err(format!("{}: requests_per_window must be > 0", name));
            }
            if limits.window_secs == 0 {
                return Err(format!("{}: window_secs must be > 0", name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_limits() {
        let p = RateLimitPolicies::default();
        assert_eq!(p.attempt_create.window(), WindowLimit::new(20, 60_000));
        assert_eq!(p.attempt_create_ip.window(), WindowLimit::new(60, 60_000));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_window_is_invalid() {
        let mut p = RateLimitPolicies::default();
        p.attempt_create_ip.window_secs = 0;
        assert!(p.validate().unwrap_err().contains("attempt_create_ip"));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let p: RateLimitPolicies = serde_json::from_str(
            r#"{ "attempt_create": { "requests_per_window": 5, "window_secs": 30 } }"#,
        )
        .unwrap();
        assert_eq!(p.attempt_create, PolicyLimits::new(5, 30));
        assert_eq!(p.attempt_create_ip, PolicyLimits::new(60, 60));
    }
}
