//! Error types for command distribution

use keystone_core::{CoreError, Key};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DistributionError>;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown distribution: {key}")]
    UnknownDistribution { key: Key },

    #[error("Partition {partition} is not a target of distribution {key}")]
    UnknownTarget { key: Key, partition: u32 },

    #[error("Prometheus metric error: {0}")]
    Metrics(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<bincode::Error> for DistributionError {
    fn from(e: bincode::Error) -> Self {
        DistributionError::Serialization(e.to_string())
    }
}

impl From<prometheus::Error> for DistributionError {
    fn from(e: prometheus::Error) -> Self {
        DistributionError::Metrics(e.to_string())
    }
}

impl From<CoreError> for DistributionError {
    fn from(e: CoreError) -> Self {
        DistributionError::Transport(e.to_string())
    }
}
