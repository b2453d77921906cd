//! Entitlement configuration

use serde::Deserialize;

use crate::domain::entitlement::{GracePolicy, DEFAULT_FREE_ATTEMPT_CAP};

/// Free-tier and grace-window settings
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementConfig {
    /// Cap given to subscribers created on first contact
    #[serde(default = "default_free_cap")]
    pub default_free_cap: u32,

    /// How a lapsed subscription's paid period is honoured
    #[serde(default)]
    pub grace: GracePolicy,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            default_free_cap: default_free_cap(),
            grace: GracePolicy::default(),
        }
    }
}

fn default_free_cap() -> u32 {
    DEFAULT_FREE_ATTEMPT_CAP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_honor_grace_window() {
        let config = EntitlementConfig::default();
        assert_eq!(config.default_free_cap, 3);
        assert!(config.grace.honor_period_end);
        assert!(config.grace.include_past_due);
    }

    #[test]
    fn test_partial_grace_override() {
        let config: EntitlementConfig =
            serde_json::from_str(r#"{ "grace": { "include_past_due": false } }"#).unwrap();
        assert!(config.grace.honor_period_end);
        assert!(!config.grace.include_past_due);
    }
}
