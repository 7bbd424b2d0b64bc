//! Record keys
//!
//! A key is unique across the whole cluster: the upper bits carry the
//! partition that generated it, the lower bits a per-partition counter.

use super::partition::PartitionId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Record key
pub type Key = u64;

const PARTITION_BITS: u32 = 13;
const COUNTER_BITS: u32 = 64 - PARTITION_BITS;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Highest partition id that fits into a key
pub const MAX_PARTITION_ID: PartitionId = (1 << PARTITION_BITS) - 1;

/// Extract the partition a key was generated on
pub fn decode_partition_id(key: Key) -> PartitionId {
    (key >> COUNTER_BITS) as PartitionId
}

fn encode(partition_id: PartitionId, counter: u64) -> Key {
    ((partition_id as u64) << COUNTER_BITS) | (counter & COUNTER_MASK)
}

/// Monotonic key source for one partition
#[derive(Debug)]
pub struct KeyGenerator {
    partition_id: PartitionId,
    counter: AtomicU64,
}

impl KeyGenerator {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            counter: AtomicU64::new(0),
        }
    }

    /// Next unused key
    pub fn next_key(&self) -> Key {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        encode(self.partition_id, counter)
    }

    /// Most recently issued key, if any
    pub fn current_key(&self) -> Option<Key> {
        match self.counter.load(Ordering::SeqCst) {
            0 => None,
            counter => Some(encode(self.partition_id, counter)),
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_monotonic() {
        let generator = KeyGenerator::new(1);
        let first = generator.next_key();
        let second = generator.next_key();

        assert!(second > first);
        assert_eq!(generator.current_key(), Some(second));
    }

    #[test]
    fn test_partition_round_trips_through_key() {
        for partition in [1, 2, 7, 8191] {
            let generator = KeyGenerator::new(partition);
            let key = generator.next_key();
            assert_eq!(decode_partition_id(key), partition);
        }
    }

    #[test]
    fn test_highest_partition_keys_stay_distinct() {
        let first = KeyGenerator::new(1).next_key();
        let last = KeyGenerator::new(MAX_PARTITION_ID).next_key();

        assert_ne!(first, last);
        assert_eq!(decode_partition_id(last), MAX_PARTITION_ID);
    }

    #[test]
    fn test_keys_differ_across_partitions() {
        let one = KeyGenerator::new(1);
        let two = KeyGenerator::new(2);

        assert_ne!(one.next_key(), two.next_key());
    }

    #[test]
    fn test_fresh_generator_has_no_current_key() {
        assert_eq!(KeyGenerator::new(3).current_key(), None);
    }
}
