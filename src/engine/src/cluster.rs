//! In-memory multi-partition cluster
//!
//! Partitions share a loopback network and a controlled clock. Messages are
//! delivered only when [`Cluster::pump`] runs, and an interceptor can drop
//! any of them, which makes loss and retry scenarios deterministic.

use crate::command::Command;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::partition::{CommandOutcome, DistributedCommand, Partition};
use keystone_authz::{IdentitySnapshot, Principal};
use keystone_core::{
    ClusterTopology, ControlledClock, PartitionId, PartitionTransport, DEPLOYMENT_PARTITION,
};
use keystone_distribution::DistributionMessage;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A message in flight between two partitions
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: PartitionId,
    pub to: PartitionId,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn message(&self) -> Option<DistributionMessage<DistributedCommand>> {
        DistributionMessage::decode(&self.payload).ok()
    }

    pub fn is_acknowledge(&self) -> bool {
        self.message().map(|m| m.is_acknowledge()).unwrap_or(false)
    }
}

/// Returns true for messages that should be dropped
type Interceptor = Box<dyn FnMut(&Envelope) -> bool + Send>;

#[derive(Default)]
struct LoopbackNetwork {
    in_flight: Mutex<VecDeque<Envelope>>,
    interceptor: Mutex<Option<Interceptor>>,
}

impl LoopbackNetwork {
    fn take(&self) -> Vec<Envelope> {
        self.in_flight.lock().drain(..).collect()
    }

    fn intercepted(&self, envelope: &Envelope) -> bool {
        self.interceptor
            .lock()
            .as_mut()
            .map(|interceptor| interceptor(envelope))
            .unwrap_or(false)
    }
}

struct LoopbackTransport {
    from: PartitionId,
    network: Arc<LoopbackNetwork>,
}

impl PartitionTransport for LoopbackTransport {
    fn send(&self, target: PartitionId, payload: Vec<u8>) -> keystone_core::Result<()> {
        self.network.in_flight.lock().push_back(Envelope {
            from: self.from,
            to: target,
            payload,
        });
        Ok(())
    }
}

pub struct Cluster {
    topology: ClusterTopology,
    config: EngineConfig,
    clock: Arc<ControlledClock>,
    network: Arc<LoopbackNetwork>,
    partitions: BTreeMap<PartitionId, Partition>,
}

impl Cluster {
    pub fn new(partition_count: u32, config: EngineConfig) -> Result<Self> {
        let topology = ClusterTopology::new(partition_count)?;
        let clock = Arc::new(ControlledClock::new(0));
        let network = Arc::new(LoopbackNetwork::default());

        let mut partitions = BTreeMap::new();
        for id in topology.partitions() {
            let transport = Arc::new(LoopbackTransport {
                from: id,
                network: network.clone(),
            });
            let partition = Partition::new(
                id,
                topology.clone(),
                config.clone(),
                transport,
                clock.clone(),
            )?;
            partitions.insert(id, partition);
        }

        Ok(Self {
            topology,
            config,
            clock,
            network,
            partitions,
        })
    }

    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    pub fn partition(&self, id: PartitionId) -> Result<&Partition> {
        self.partitions
            .get(&id)
            .ok_or(EngineError::UnknownPartition(id))
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn coordinator(&self) -> Result<&Partition> {
        self.partition(DEPLOYMENT_PARTITION)
    }

    pub fn submit(
        &mut self,
        partition: PartitionId,
        command: Command,
        principal: &Principal,
    ) -> Result<CommandOutcome> {
        self.partitions
            .get_mut(&partition)
            .ok_or(EngineError::UnknownPartition(partition))?
            .submit(command, principal)
    }

    /// Submit to the deployment partition, where administrative commands
    /// are issued
    pub fn submit_to_coordinator(
        &mut self,
        command: Command,
        principal: &Principal,
    ) -> Result<CommandOutcome> {
        self.submit(DEPLOYMENT_PARTITION, command, principal)
    }

    /// Drop every message for which `interceptor` returns true
    pub fn intercept(&self, interceptor: impl FnMut(&Envelope) -> bool + Send + 'static) {
        *self.network.interceptor.lock() = Some(Box::new(interceptor));
    }

    pub fn clear_interceptor(&self) {
        *self.network.interceptor.lock() = None;
    }

    pub fn in_flight(&self) -> usize {
        self.network.in_flight.lock().len()
    }

    /// Deliver messages until none are left. Returns how many were
    /// delivered.
    pub fn pump(&mut self) -> Result<usize> {
        let mut delivered = 0;
        loop {
            let envelopes = self.network.take();
            if envelopes.is_empty() {
                return Ok(delivered);
            }
            for envelope in envelopes {
                if self.network.intercepted(&envelope) {
                    debug!(from = envelope.from, to = envelope.to, "Message intercepted");
                    continue;
                }
                self.partitions
                    .get_mut(&envelope.to)
                    .ok_or(EngineError::UnknownPartition(envelope.to))?
                    .handle_message(&envelope.payload)?;
                delivered += 1;
            }
        }
    }

    pub fn advance_clock(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Run the redistribution scan on every partition
    pub fn redistribute(&mut self) -> Result<usize> {
        let mut resent = 0;
        for partition in self.partitions.values_mut() {
            resent += partition.redistribute()?;
        }
        Ok(resent)
    }

    pub fn is_idle(&self) -> bool {
        self.partitions.values().all(Partition::is_idle)
    }

    /// Deliver, then retry until every distribution finished, for at most
    /// `max_rounds` retry rounds
    pub fn settle(&mut self, max_rounds: usize) -> Result<()> {
        let distribution = &self.config.distribution;
        let retry_after = Duration::from_millis(
            distribution
                .max_retry_delay_ms
                .max(distribution.scan_interval_ms),
        );
        for _ in 0..max_rounds {
            self.pump()?;
            if self.is_idle() {
                return Ok(());
            }
            self.advance_clock(retry_after);
            self.redistribute()?;
        }
        self.pump()?;
        if self.is_idle() {
            Ok(())
        } else {
            Err(EngineError::internal(format!(
                "cluster did not settle within {max_rounds} rounds"
            )))
        }
    }

    /// Every partition holds the same identity state
    pub fn is_converged(&self) -> bool {
        let mut snapshots = self.partitions.values().map(Partition::snapshot);
        match snapshots.next() {
            Some(first) => snapshots.all(|snapshot| snapshot == first),
            None => true,
        }
    }

    pub fn snapshots(&self) -> BTreeMap<PartitionId, IdentitySnapshot> {
        self.partitions
            .iter()
            .map(|(id, partition)| (*id, partition.snapshot()))
            .collect()
    }
}
