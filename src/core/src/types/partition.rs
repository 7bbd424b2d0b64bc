//! Partition identifiers and cluster topology

use super::key::MAX_PARTITION_ID;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Partition identifier, starting at [`START_PARTITION_ID`]
pub type PartitionId = u32;

/// First partition id in every cluster
pub const START_PARTITION_ID: PartitionId = 1;

/// Coordinator partition for administrative commands
pub const DEPLOYMENT_PARTITION: PartitionId = START_PARTITION_ID;

/// Static view of the partition set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    partition_count: u32,
    coordinator: PartitionId,
}

impl ClusterTopology {
    /// Every partition id must be encodable into a record key
    pub const MAX_PARTITION_COUNT: u32 = MAX_PARTITION_ID - START_PARTITION_ID + 1;

    /// Create a topology of `partition_count` partitions coordinated by the
    /// deployment partition
    pub fn new(partition_count: u32) -> Result<Self> {
        if partition_count == 0 {
            return Err(CoreError::configuration(
                "partition count must be at least 1",
            ));
        }
        if partition_count > Self::MAX_PARTITION_COUNT {
            return Err(CoreError::configuration(format!(
                "partition count {} exceeds the maximum of {}",
                partition_count,
                Self::MAX_PARTITION_COUNT
            )));
        }
        Ok(Self {
            partition_count,
            coordinator: DEPLOYMENT_PARTITION,
        })
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn coordinator(&self) -> PartitionId {
        self.coordinator
    }

    /// All partition ids in ascending order
    pub fn partitions(&self) -> Vec<PartitionId> {
        (START_PARTITION_ID..START_PARTITION_ID + self.partition_count).collect()
    }

    /// Every partition except `origin`
    pub fn other_partitions(&self, origin: PartitionId) -> Vec<PartitionId> {
        self.partitions()
            .into_iter()
            .filter(|id| *id != origin)
            .collect()
    }

    pub fn contains(&self, partition: PartitionId) -> bool {
        partition >= START_PARTITION_ID && partition < START_PARTITION_ID + self.partition_count
    }

    /// Fails with [`CoreError::UnknownPartition`] for ids outside the cluster
    pub fn check(&self, partition: PartitionId) -> Result<()> {
        if self.contains(partition) {
            Ok(())
        } else {
            Err(CoreError::UnknownPartition(partition))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_start_at_one() {
        let topology = ClusterTopology::new(3).unwrap();
        assert_eq!(topology.partitions(), vec![1, 2, 3]);
        assert_eq!(topology.coordinator(), 1);
    }

    #[test]
    fn test_other_partitions_excludes_origin() {
        let topology = ClusterTopology::new(3).unwrap();
        assert_eq!(topology.other_partitions(1), vec![2, 3]);
        assert_eq!(topology.other_partitions(2), vec![1, 3]);
    }

    #[test]
    fn test_zero_partitions_rejected() {
        assert!(ClusterTopology::new(0).is_err());
    }

    #[test]
    fn test_partition_count_limited_by_key_space() {
        let topology = ClusterTopology::new(ClusterTopology::MAX_PARTITION_COUNT).unwrap();
        assert_eq!(topology.partitions().last().copied(), Some(MAX_PARTITION_ID));

        assert!(ClusterTopology::new(ClusterTopology::MAX_PARTITION_COUNT + 1).is_err());
        assert!(ClusterTopology::new(u32::MAX).is_err());
    }

    #[test]
    fn test_check_unknown_partition() {
        let topology = ClusterTopology::new(2).unwrap();
        assert!(topology.check(2).is_ok());
        assert!(matches!(topology.check(3), Err(CoreError::UnknownPartition(3))));
        assert!(topology.check(0).is_err());
    }
}
