//! Combined subscriber and network-origin checks.

use crate::ports::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter, WindowLimit};

/// Counts one hit against the subscriber counter and, when an IP is known,
/// against the IP counter as well.
///
/// Both counters are always incremented so a caller switching identities
/// cannot dodge either window. The result is denied if either denies.
pub async fn check_user_and_ip(
    limiter: &dyn RateLimiter,
    user: (&RateLimitKey, WindowLimit),
    ip: Option<(&RateLimitKey, WindowLimit)>,
) -> Result<RateLimitDecision, RateLimitError> {
    let (user_key, user_limit) = user;
    let user_decision = limiter.check(user_key, user_limit).await?;
    match ip {
        Some((ip_key, ip_limit)) => {
            let ip_decision = limiter.check(ip_key, ip_limit).await?;
            Ok(user_decision.combine(ip_decision))
        }
        None => Ok(user_decision),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rate_limiter::InMemoryRateLimiter;

    #[tokio::test]
    async fn ip_window_denies_even_when_user_has_room() {
        let limiter = InMemoryRateLimiter::new();
        let ip = RateLimitKey::ip("attempt_create", "203.0.113.9");
        let ip_limit = WindowLimit::new(2, 60_000);
        let user_limit = WindowLimit::new(10, 60_000);

        for user in ["a", "b"] {
            let key = RateLimitKey::user("attempt_create", user);
            let d = check_user_and_ip(&limiter, (&key, user_limit), Some((&ip, ip_limit)))
                .await
                .unwrap();
            assert!(d.allowed);
        }

        let key = RateLimitKey::user("attempt_create", "c");
        let d = check_user_and_ip(&limiter, (&key, user_limit), Some((&ip, ip_limit)))
            .await
            .unwrap();
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn missing_ip_checks_user_only() {
        let limiter = InMemoryRateLimiter::new();
        let key = RateLimitKey::user("attempt_create", "a");
        let d = check_user_and_ip(&limiter, (&key, WindowLimit::new(1, 60_000)), None)
            .await
            .unwrap();
        assert!(d.allowed);
        assert_eq!(limiter.tracked_keys().await, 1);
    }
}
