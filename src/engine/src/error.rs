//! Error types for the partition engine
//!
//! Command rejections are not errors; see [`keystone_authz::Rejection`].
//! An [`EngineError`] means the partition itself could not make progress.

use keystone_authz::AuthzError;
use keystone_core::{CoreError, PartitionId};
use keystone_distribution::DistributionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Authorization error: {0}")]
    Authz(#[from] AuthzError),

    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Unknown partition: {0}")]
    UnknownPartition(PartitionId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        EngineError::Configuration(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        EngineError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(EngineError::UnknownPartition(9).to_string(), "Unknown partition: 9");

        let err: EngineError = CoreError::transport("closed").into();
        assert!(err.to_string().contains("closed"));
    }
}
