//! Inter-partition distribution messages

use crate::error::Result;
use crate::queue::QueueId;
use keystone_core::{Key, PartitionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Wire message between an origin partition and a target partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DistributionMessage<C> {
    /// Origin asks a target to apply a command
    Distribute {
        distribution_key: Key,
        origin: PartitionId,
        queue: Option<QueueId>,
        command: C,
    },
    /// Target confirms it applied the command
    Acknowledge {
        distribution_key: Key,
        partition: PartitionId,
        queue: Option<QueueId>,
    },
}

impl<C> DistributionMessage<C> {
    pub fn distribution_key(&self) -> Key {
        match self {
            DistributionMessage::Distribute { distribution_key, .. }
            | DistributionMessage::Acknowledge { distribution_key, .. } => *distribution_key,
        }
    }

    pub fn is_acknowledge(&self) -> bool {
        matches!(self, DistributionMessage::Acknowledge { .. })
    }
}

impl<C: Serialize + DeserializeOwned> DistributionMessage<C> {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
