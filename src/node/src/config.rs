//! Node configuration loading and validation

use anyhow::{Context, Result};
use keystone_authz::SecurityConfig;
use keystone_core::ClusterTopology;
use keystone_distribution::RedistributionConfig;
use keystone_engine::{EngineConfig, IdentitySetupValue, MappingRuleValue, UserValue};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub cluster: ClusterSection,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub distribution: RedistributionConfig,

    #[serde(default)]
    pub identity_setup: IdentitySetupSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeSection {
    /// Generated at startup when empty
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How often partition statistics are logged
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            log_level: default_log_level(),
            status_interval_secs: default_status_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterSection {
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Capacity of each partition's command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            command_buffer: default_command_buffer(),
        }
    }
}

/// Bootstrap issued on the coordinator when the node starts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdentitySetupSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub users: Vec<SetupUser>,
    #[serde(default)]
    pub mapping_rules: Vec<SetupMappingRule>,
}

impl Default for IdentitySetupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            users: Vec::new(),
            mapping_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SetupUser {
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SetupMappingRule {
    pub mapping_rule_id: String,
    pub claim_name: String,
    pub claim_value: String,
}

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_status_interval() -> u64 { 30 }
fn default_partitions() -> u32 { 3 }
fn default_command_buffer() -> usize { 1_024 }

impl NodeConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .context("Failed to read configuration file")?;

        let config: NodeConfig = toml::from_str(&contents)
            .context("Failed to parse configuration file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cluster.partitions == 0 {
            anyhow::bail!("Cluster must have at least one partition");
        }

        if self.cluster.partitions > ClusterTopology::MAX_PARTITION_COUNT {
            anyhow::bail!(
                "Cluster supports at most {} partitions",
                ClusterTopology::MAX_PARTITION_COUNT
            );
        }

        if self.cluster.command_buffer == 0 {
            anyhow::bail!("Command buffer must be positive");
        }

        if self.node.status_interval_secs == 0 {
            anyhow::bail!("Status interval must be positive");
        }

        self.engine()
            .validate()
            .context("Invalid security or distribution settings")?;

        for user in &self.identity_setup.users {
            if user.username.is_empty() {
                anyhow::bail!("Identity setup users need a username");
            }
        }

        Ok(())
    }

    /// Settings shared by every partition
    pub fn engine(&self) -> EngineConfig {
        EngineConfig::default()
            .with_security(self.security.clone())
            .with_distribution(self.distribution.clone())
    }

    /// The admin bootstrap with the configured users and mapping rules
    pub fn identity_setup(&self) -> Option<IdentitySetupValue> {
        if !self.identity_setup.enabled {
            return None;
        }

        let mut setup = IdentitySetupValue::admin_role();
        for user in &self.identity_setup.users {
            let mut value = UserValue::new(user.username.clone()).with_email(user.email.clone());
            if !user.name.is_empty() {
                value.name = user.name.clone();
            }
            setup = setup.with_user(value);
        }
        for rule in &self.identity_setup.mapping_rules {
            setup = setup.with_mapping_rule(MappingRuleValue::new(
                rule.mapping_rule_id.clone(),
                rule.claim_name.clone(),
                rule.claim_value.clone(),
            ));
        }
        Some(setup)
    }
}
