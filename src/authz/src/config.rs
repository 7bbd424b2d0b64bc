//! Security configuration
//!
//! Feature flags are passed to the resolver at construction; nothing here is
//! read from global state.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Security settings for one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub authorizations: AuthorizationsConfig,

    #[serde(default)]
    pub multi_tenancy: MultiTenancyConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationsConfig {
    /// Evaluate permissions for every command
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuthorizationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MultiTenancyConfig {
    /// Restrict commands to the tenants assigned to the principal
    #[serde(default)]
    pub checks_enabled: bool,
}

/// Owner closure cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of cached principals
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Time-to-live for cached entries
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_true() -> bool { true }
fn default_capacity() -> usize { 1_000 }
fn default_ttl_secs() -> u64 { 60 }

impl SecurityConfig {
    /// Authorizations on, multi-tenancy off
    pub fn enabled() -> Self {
        Self::default()
    }

    /// Neither permission nor tenant checks
    pub fn disabled() -> Self {
        Self {
            authorizations: AuthorizationsConfig { enabled: false },
            ..Self::default()
        }
    }

    pub fn with_multi_tenancy(mut self, checks_enabled: bool) -> Self {
        self.multi_tenancy.checks_enabled = checks_enabled;
        self
    }

    pub fn with_authorizations(mut self, enabled: bool) -> Self {
        self.authorizations.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(AuthzError::Configuration(
                "cache capacity must be positive when the cache is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecurityConfig::default();
        assert!(config.authorizations.enabled);
        assert!(!config.multi_tenancy.checks_enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: SecurityConfig =
            serde_json::from_str(r#"{"multi_tenancy": {"checks_enabled": true}}"#).unwrap();
        assert!(config.authorizations.enabled);
        assert!(config.multi_tenancy.checks_enabled);
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let mut config = SecurityConfig::default();
        config.cache.capacity = 0;
        assert!(matches!(config.validate(), Err(AuthzError::Configuration(_))));

        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }
}
