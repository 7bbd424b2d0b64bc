//! Partition engine configuration

use crate::error::{EngineError, Result};
use keystone_authz::SecurityConfig;
use keystone_distribution::RedistributionConfig;
use serde::{Deserialize, Serialize};

/// Settings shared by every partition of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub distribution: RedistributionConfig,
}

impl EngineConfig {
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_distribution(mut self, distribution: RedistributionConfig) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.security.validate()?;
        self.distribution
            .validate()
            .map_err(|e| EngineError::configuration(e.to_string()))
    }
}
