//! Distribution state management
//!
//! Pending distributions live in an arena keyed by distribution key. Each
//! `(queue, target)` pair has a FIFO lane of keys; only the lane head is ever
//! in flight to that target.
//!
//! A lane releases its next key only after the previous one was applied, and
//! an origin issues keys in ascending order. Targets therefore remember one
//! high-water key per `(origin, queue)` instead of every applied key. Only
//! unqueued distributions are tracked key by key.

use crate::queue::QueueId;
use keystone_core::{Key, PartitionId};
use std::collections::{BTreeMap, HashSet, VecDeque};

type LaneKey = (QueueId, PartitionId);

/// Progress of one target partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TargetState {
    /// Waiting behind an earlier distribution in its lane
    Enqueued,
    /// Sent, not yet acknowledged
    Distributing,
    /// Applied on the target
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProgress {
    pub state: TargetState,
    /// Sends so far, retries included
    pub attempts: u32,
    pub last_sent_at: Option<i64>,
    /// Earliest time the scheduler may resend
    pub next_retry_at: Option<i64>,
}

impl TargetProgress {
    fn enqueued() -> Self {
        Self {
            state: TargetState::Enqueued,
            attempts: 0,
            last_sent_at: None,
            next_retry_at: None,
        }
    }
}

/// A distribution that has not finished yet
#[derive(Debug, Clone)]
pub struct PendingDistribution<C> {
    pub distribution_key: Key,
    pub queue: Option<QueueId>,
    pub origin: PartitionId,
    pub command: C,
    pub targets: BTreeMap<PartitionId, TargetProgress>,
    pub started_at: i64,
}

impl<C> PendingDistribution<C> {
    pub fn new(
        distribution_key: Key,
        queue: Option<QueueId>,
        origin: PartitionId,
        command: C,
        targets: impl IntoIterator<Item = PartitionId>,
        started_at: i64,
    ) -> Self {
        Self {
            distribution_key,
            queue,
            origin,
            command,
            targets: targets
                .into_iter()
                .map(|target| (target, TargetProgress::enqueued()))
                .collect(),
            started_at,
        }
    }

    /// Finished once every target acknowledged
    pub fn is_finished(&self) -> bool {
        self.targets
            .values()
            .all(|progress| progress.state == TargetState::Acknowledged)
    }

    pub fn target_state(&self, target: PartitionId) -> Option<TargetState> {
        self.targets.get(&target).map(|progress| progress.state)
    }

    /// Targets that have not acknowledged yet
    pub fn unacknowledged(&self) -> Vec<PartitionId> {
        self.targets
            .iter()
            .filter(|(_, progress)| progress.state != TargetState::Acknowledged)
            .map(|(target, _)| *target)
            .collect()
    }
}

/// Origin-side arena and lanes, plus target-side record of applied keys
#[derive(Debug)]
pub struct DistributionState<C> {
    pending: BTreeMap<Key, PendingDistribution<C>>,
    lanes: BTreeMap<LaneKey, VecDeque<Key>>,
    /// Highest applied key per (queue, origin)
    applied_up_to: BTreeMap<LaneKey, Key>,
    received_unqueued: HashSet<Key>,
}

impl<C> DistributionState<C> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            lanes: BTreeMap::new(),
            applied_up_to: BTreeMap::new(),
            received_unqueued: HashSet::new(),
        }
    }

    pub fn insert(&mut self, distribution: PendingDistribution<C>) {
        self.pending
            .insert(distribution.distribution_key, distribution);
    }

    pub fn get(&self, key: Key) -> Option<&PendingDistribution<C>> {
        self.pending.get(&key)
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut PendingDistribution<C>> {
        self.pending.get_mut(&key)
    }

    pub fn remove(&mut self, key: Key) -> Option<PendingDistribution<C>> {
        self.pending.remove(&key)
    }

    /// Pending distributions in key order
    pub fn pending(&self) -> impl Iterator<Item = &PendingDistribution<C>> {
        self.pending.values()
    }

    /// Append to a lane. Returns true if the key is now the lane head.
    pub fn enqueue(&mut self, queue: &QueueId, target: PartitionId, key: Key) -> bool {
        let lane = self.lanes.entry((queue.clone(), target)).or_default();
        lane.push_back(key);
        lane.front() == Some(&key)
    }

    pub fn lane_head(&self, queue: &QueueId, target: PartitionId) -> Option<Key> {
        self.lanes
            .get(&(queue.clone(), target))
            .and_then(|lane| lane.front().copied())
    }

    /// Remove `key` from its lane and return the new head
    pub fn pop_lane(&mut self, queue: &QueueId, target: PartitionId, key: Key) -> Option<Key> {
        let lane_key = (queue.clone(), target);
        let lane = self.lanes.get_mut(&lane_key)?;
        lane.retain(|queued| *queued != key);
        let head = lane.front().copied();
        if lane.is_empty() {
            self.lanes.remove(&lane_key);
        }
        head
    }

    /// Head of every non-empty lane, in lane order
    pub fn lane_heads(&self) -> Vec<(QueueId, PartitionId, Key)> {
        self.lanes
            .iter()
            .filter_map(|((queue, target), lane)| {
                lane.front().map(|key| (queue.clone(), *target, *key))
            })
            .collect()
    }

    /// Keys queued for one lane, head first
    pub fn lane(&self, queue: &QueueId, target: PartitionId) -> Vec<Key> {
        self.lanes
            .get(&(queue.clone(), target))
            .map(|lane| lane.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record a delivered distribution. Returns false if it was already
    /// applied here.
    pub fn mark_received(&mut self, origin: PartitionId, queue: Option<&QueueId>, key: Key) -> bool {
        match queue {
            Some(queue) => {
                let high_water = self.applied_up_to.entry((queue.clone(), origin)).or_insert(0);
                if key <= *high_water {
                    return false;
                }
                *high_water = key;
                true
            }
            None => self.received_unqueued.insert(key),
        }
    }

    pub fn has_received(&self, origin: PartitionId, queue: Option<&QueueId>, key: Key) -> bool {
        match queue {
            Some(queue) => self
                .applied_up_to
                .get(&(queue.clone(), origin))
                .is_some_and(|high_water| key <= *high_water),
            None => self.received_unqueued.contains(&key),
        }
    }

    pub fn stats(&self) -> DistributionStats {
        DistributionStats {
            pending: self.pending.len(),
            lanes: self.lanes.len(),
            queued: self.lanes.values().map(VecDeque::len).sum(),
            received: self.applied_up_to.len() + self.received_unqueued.len(),
        }
    }
}

impl<C> Default for DistributionState<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionStats {
    pub pending: usize,
    pub lanes: usize,
    pub queued: usize,
    /// Entries kept to detect redelivered commands
    pub received: usize,
}
