//! Redistribution of stalled distributions
//!
//! Retries never reorder a queue: for queued distributions only lane heads
//! are candidates, so an older pending command is always resent before a
//! newer one of the same queue can be sent at all.

use crate::config::RedistributionConfig;
use crate::distributor::CommandDistributor;
use crate::error::Result;
use crate::state::{DistributionState, TargetState};
use keystone_core::{Key, PartitionId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Timer-driven retry of unacknowledged sends
#[derive(Debug, Clone)]
pub struct RedistributionScheduler {
    config: RedistributionConfig,
    last_scan: Option<i64>,
}

impl RedistributionScheduler {
    pub fn new(config: RedistributionConfig) -> Self {
        Self {
            config,
            last_scan: None,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        self.config.scan_interval()
    }

    /// Whether a scan is due at `now`
    pub fn is_due(&self, now: i64) -> bool {
        match self.last_scan {
            None => true,
            Some(last) => now - last >= self.config.scan_interval_ms as i64,
        }
    }

    /// Scan if the interval elapsed. Returns the number of resends.
    pub fn tick<C>(&mut self, distributor: &mut CommandDistributor<C>) -> Result<usize>
    where
        C: Serialize + DeserializeOwned + Clone,
    {
        let now = distributor.now();
        if !self.is_due(now) {
            return Ok(0);
        }
        self.run(distributor)
    }

    /// Scan immediately, resending every due send in key order
    pub fn run<C>(&mut self, distributor: &mut CommandDistributor<C>) -> Result<usize>
    where
        C: Serialize + DeserializeOwned + Clone,
    {
        let now = distributor.now();
        self.last_scan = Some(now);

        let due = Self::due_retries(distributor.state(), now);
        for (key, target) in &due {
            distributor.resend(*key, *target)?;
        }

        if !due.is_empty() {
            debug!(
                partition = distributor.partition_id(),
                resent = due.len(),
                "Redistributed stalled commands"
            );
        }
        Ok(due.len())
    }

    /// Sends whose retry time has passed: lane heads for queued
    /// distributions, every unacknowledged target otherwise. Finished
    /// distributions are no longer in the state and never appear.
    pub fn due_retries<C>(state: &DistributionState<C>, now: i64) -> Vec<(Key, PartitionId)> {
        let is_due = |key: Key, target: PartitionId| {
            state
                .get(key)
                .and_then(|distribution| distribution.targets.get(&target))
                .map(|progress| match progress.state {
                    TargetState::Distributing => progress.next_retry_at.map_or(true, |at| at <= now),
                    TargetState::Enqueued => true,
                    TargetState::Acknowledged => false,
                })
                .unwrap_or(false)
        };

        let mut due: Vec<(Key, PartitionId)> = state
            .lane_heads()
            .into_iter()
            .filter(|(_, target, key)| is_due(*key, *target))
            .map(|(_, target, key)| (key, target))
            .collect();

        for distribution in state.pending().filter(|d| d.queue.is_none()) {
            for target in distribution.unacknowledged() {
                if is_due(distribution.distribution_key, target) {
                    due.push((distribution.distribution_key, target));
                }
            }
        }

        due.sort_unstable();
        due.dedup();
        due
    }
}
