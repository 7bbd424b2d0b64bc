//! Reliable ordered command distribution
//!
//! The origin partition calls [`CommandDistributor::distribute`] after it
//! applied a command locally. The distributor records a pending
//! distribution, appends it to the `(queue, target)` lanes and sends each
//! lane head to its target. Targets hand received commands to their own
//! processor and acknowledge; each acknowledgment releases the next entry of
//! that lane. Lost sends are recovered by the
//! [`RedistributionScheduler`](crate::RedistributionScheduler).

use crate::config::RedistributionConfig;
use crate::error::{DistributionError, Result};
use crate::message::DistributionMessage;
use crate::metrics::DistributionMetrics;
use crate::queue::QueueId;
use crate::record::{DistributionEvent, DistributionIntent};
use crate::state::{DistributionState, DistributionStats, PendingDistribution, TargetState};

use keystone_core::{Clock, Key, KeyGenerator, PartitionId, PartitionTransport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A distributed command received by a target partition
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCommand<C> {
    pub distribution_key: Key,
    pub origin: PartitionId,
    pub queue: Option<QueueId>,
    pub command: C,
    /// Already applied on this partition; acknowledge without applying
    pub duplicate: bool,
}

/// Per-partition distributor, generic over the distributed command type
pub struct CommandDistributor<C> {
    partition_id: PartitionId,
    keys: Arc<KeyGenerator>,
    transport: Arc<dyn PartitionTransport>,
    clock: Arc<dyn Clock>,
    config: RedistributionConfig,
    state: DistributionState<C>,
    events: Vec<DistributionEvent>,
    metrics: DistributionMetrics,
}

impl<C> CommandDistributor<C>
where
    C: Serialize + DeserializeOwned + Clone,
{
    pub fn new(
        partition_id: PartitionId,
        keys: Arc<KeyGenerator>,
        transport: Arc<dyn PartitionTransport>,
        clock: Arc<dyn Clock>,
        config: RedistributionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = DistributionMetrics::new(partition_id)?;

        Ok(Self {
            partition_id,
            keys,
            transport,
            clock,
            config,
            state: DistributionState::new(),
            events: Vec::new(),
            metrics,
        })
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    pub fn config(&self) -> &RedistributionConfig {
        &self.config
    }

    pub fn state(&self) -> &DistributionState<C> {
        &self.state
    }

    pub fn metrics(&self) -> &DistributionMetrics {
        &self.metrics
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn pending(&self, key: Key) -> Option<&PendingDistribution<C>> {
        self.state.get(key)
    }

    /// No distribution is waiting for acknowledgment
    pub fn is_idle(&self) -> bool {
        self.state.pending().next().is_none()
    }

    pub fn stats(&self) -> DistributionStats {
        self.state.stats()
    }

    /// Lifecycle records produced since the last drain
    pub fn drain_events(&mut self) -> Vec<DistributionEvent> {
        std::mem::take(&mut self.events)
    }

    // ==================== Origin side ====================

    /// Start distributing an already applied command to `targets`.
    ///
    /// With a queue, each target receives the command only after every
    /// earlier command of the same queue was acknowledged by that target.
    /// Without a queue, the command is sent to all targets at once.
    ///
    /// Fails without recording anything if the command cannot be encoded.
    pub fn distribute(
        &mut self,
        command: C,
        queue: Option<QueueId>,
        targets: impl IntoIterator<Item = PartitionId>,
    ) -> Result<Key> {
        // Only the command can fail to encode; check it before recording
        bincode::serialized_size(&command)?;

        let key = self.keys.next_key();
        let now = self.now();
        let targets: Vec<PartitionId> = targets
            .into_iter()
            .filter(|target| *target != self.partition_id)
            .collect();

        self.emit(DistributionIntent::Started, key, self.partition_id, &queue);
        self.metrics.started.inc();

        if targets.is_empty() {
            self.emit(DistributionIntent::Finished, key, self.partition_id, &queue);
            self.metrics.finished.inc();
            debug!(distribution_key = key, "Distribution has no targets");
            return Ok(key);
        }

        info!(
            partition = self.partition_id,
            distribution_key = key,
            queue = ?queue,
            targets = ?targets,
            "Starting command distribution"
        );

        self.state.insert(PendingDistribution::new(
            key,
            queue.clone(),
            self.partition_id,
            command,
            targets.iter().copied(),
            now,
        ));
        self.metrics.pending.inc();

        for target in targets {
            let ready = match &queue {
                Some(queue) => {
                    self.emit(DistributionIntent::Enqueued, key, target, &Some(queue.clone()));
                    self.state.enqueue(queue, target, key)
                }
                None => true,
            };
            if ready {
                self.send(key, target)?;
            }
        }

        Ok(key)
    }

    /// Handle an acknowledgment from `partition`. Duplicates and
    /// acknowledgments for unknown or finished distributions are ignored.
    /// Returns whether the acknowledgment changed state.
    pub fn on_acknowledge(&mut self, key: Key, partition: PartitionId) -> Result<bool> {
        let Some(distribution) = self.state.get_mut(key) else {
            debug!(distribution_key = key, partition, "Ignoring acknowledgment for unknown distribution");
            return Ok(false);
        };
        let queue = distribution.queue.clone();
        let Some(progress) = distribution.targets.get_mut(&partition) else {
            warn!(distribution_key = key, partition, "Acknowledgment from a partition that is not a target");
            return Ok(false);
        };
        if progress.state == TargetState::Acknowledged {
            debug!(distribution_key = key, partition, "Ignoring duplicate acknowledgment");
            return Ok(false);
        }

        progress.state = TargetState::Acknowledged;
        progress.next_retry_at = None;
        let finished = distribution.is_finished();
        let started_at = distribution.started_at;

        self.emit(DistributionIntent::Acknowledge, key, partition, &queue);
        self.emit(DistributionIntent::Acknowledged, key, partition, &queue);
        self.metrics.acknowledged.inc();

        if let Some(queue) = &queue {
            if let Some(next) = self.state.pop_lane(queue, partition, key) {
                self.release(next, partition)?;
            }
        }

        if finished {
            self.state.remove(key);
            self.emit(DistributionIntent::Finished, key, self.partition_id, &queue);
            self.metrics.finished.inc();
            self.metrics.pending.dec();
            self.metrics
                .completion_time
                .observe((self.now() - started_at).max(0) as f64);
            info!(partition = self.partition_id, distribution_key = key, "Command distribution finished");
        }

        Ok(true)
    }

    /// Send `key` to `target` again. Only valid for targets that have not
    /// acknowledged.
    pub fn resend(&mut self, key: Key, target: PartitionId) -> Result<()> {
        let state = self
            .state
            .get(key)
            .ok_or(DistributionError::UnknownDistribution { key })?
            .target_state(target)
            .ok_or(DistributionError::UnknownTarget { key, partition: target })?;

        if state == TargetState::Acknowledged {
            return Ok(());
        }
        self.metrics.retried.inc();
        debug!(distribution_key = key, target, "Retrying distribution");
        self.send(key, target)
    }

    /// A lane head became free to send
    fn release(&mut self, key: Key, target: PartitionId) -> Result<()> {
        match self.state.get(key).and_then(|d| d.target_state(target)) {
            Some(TargetState::Enqueued) => self.send(key, target),
            _ => Ok(()),
        }
    }

    fn send(&mut self, key: Key, target: PartitionId) -> Result<()> {
        let now = self.now();
        let Some(distribution) = self.state.get_mut(key) else {
            return Err(DistributionError::UnknownDistribution { key });
        };

        let message = DistributionMessage::Distribute {
            distribution_key: key,
            origin: distribution.origin,
            queue: distribution.queue.clone(),
            command: distribution.command.clone(),
        };
        let queue = distribution.queue.clone();
        let progress = distribution
            .targets
            .get_mut(&target)
            .ok_or(DistributionError::UnknownTarget { key, partition: target })?;

        let first_send = progress.state == TargetState::Enqueued;
        progress.state = TargetState::Distributing;
        progress.attempts += 1;
        progress.last_sent_at = Some(now);
        progress.next_retry_at =
            Some(now + self.config.retry_delay(progress.attempts).as_millis() as i64);

        if first_send {
            self.emit(DistributionIntent::Distributing, key, target, &queue);
        }

        let payload = message.encode()?;
        self.metrics.sent.inc();
        if let Err(e) = self.transport.send(target, payload) {
            warn!(distribution_key = key, target, error = %e, "Failed to send distribution, will retry");
        }
        Ok(())
    }

    // ==================== Target side ====================

    /// Decode an inbound payload. Acknowledgments are handled here;
    /// distributed commands are returned for the caller to apply and then
    /// confirm with [`acknowledge_delivery`](Self::acknowledge_delivery).
    pub fn receive(&mut self, payload: &[u8]) -> Result<Option<IncomingCommand<C>>> {
        match DistributionMessage::<C>::decode(payload)? {
            DistributionMessage::Acknowledge {
                distribution_key,
                partition,
                ..
            } => {
                self.on_acknowledge(distribution_key, partition)?;
                Ok(None)
            }
            DistributionMessage::Distribute {
                distribution_key,
                origin,
                queue,
                command,
            } => {
                let duplicate = self
                    .state
                    .has_received(origin, queue.as_ref(), distribution_key);
                if duplicate {
                    self.metrics.duplicates_received.inc();
                    debug!(distribution_key, origin, "Received already applied distribution");
                }
                Ok(Some(IncomingCommand {
                    distribution_key,
                    origin,
                    queue,
                    command,
                    duplicate,
                }))
            }
        }
    }

    /// Remember the command as applied and acknowledge it to its origin
    pub fn acknowledge_delivery(&mut self, incoming: &IncomingCommand<C>) -> Result<()> {
        self.state.mark_received(
            incoming.origin,
            incoming.queue.as_ref(),
            incoming.distribution_key,
        );

        let message: DistributionMessage<C> = DistributionMessage::Acknowledge {
            distribution_key: incoming.distribution_key,
            partition: self.partition_id,
            queue: incoming.queue.clone(),
        };
        if let Err(e) = self.transport.send(incoming.origin, message.encode()?) {
            warn!(
                distribution_key = incoming.distribution_key,
                origin = incoming.origin,
                error = %e,
                "Failed to send acknowledgment, origin will retry"
            );
        }
        Ok(())
    }

    fn emit(&mut self, intent: DistributionIntent, key: Key, partition_id: PartitionId, queue: &Option<QueueId>) {
        self.events.push(DistributionEvent {
            intent,
            distribution_key: key,
            partition_id,
            queue: queue.clone(),
            timestamp: self.clock.now_millis(),
        });
    }
}
