//! A single partition: sequential command processing plus the origin and
//! target sides of command distribution

use crate::appliers;
use crate::command::{Command, UNASSIGNED_KEY};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::processors::{self, ProcessingContext};
use crate::record::RecordLog;
use keystone_authz::{AuthorizationResolver, IdentitySnapshot, IdentityState, Principal, Rejection};
use keystone_core::{Clock, ClusterTopology, Key, KeyGenerator, PartitionId, PartitionTransport};
use keystone_distribution::{
    CommandDistributor, DistributionMetrics, QueueId, RedistributionScheduler,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What travels between partitions: an accepted command and the key of
/// the record it created or changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedCommand {
    pub key: Key,
    pub command: Command,
}

/// Result of submitting a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted {
        key: Key,
        /// The command as written to the event, keys filled in
        command: Command,
        /// Set when the command is replicated to other partitions
        distribution_key: Option<Key>,
    },
    Rejected(Rejection),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted { .. })
    }

    pub fn key(&self) -> Option<Key> {
        match self {
            CommandOutcome::Accepted { key, .. } => Some(*key),
            CommandOutcome::Rejected(_) => None,
        }
    }

    pub fn distribution_key(&self) -> Option<Key> {
        match self {
            CommandOutcome::Accepted {
                distribution_key, ..
            } => *distribution_key,
            CommandOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            CommandOutcome::Rejected(rejection) => Some(rejection),
            CommandOutcome::Accepted { .. } => None,
        }
    }
}

pub struct Partition {
    id: PartitionId,
    topology: ClusterTopology,
    state: IdentityState,
    resolver: AuthorizationResolver,
    keys: Arc<KeyGenerator>,
    distributor: CommandDistributor<DistributedCommand>,
    scheduler: RedistributionScheduler,
    log: RecordLog,
    clock: Arc<dyn Clock>,
}

impl Partition {
    pub fn new(
        id: PartitionId,
        topology: ClusterTopology,
        config: EngineConfig,
        transport: Arc<dyn PartitionTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        topology.check(id)?;
        config.validate()?;

        let keys = Arc::new(KeyGenerator::new(id));
        let distributor = CommandDistributor::new(
            id,
            keys.clone(),
            transport,
            clock.clone(),
            config.distribution.clone(),
        )?;

        info!(
            partition = id,
            partitions = topology.partition_count(),
            authorizations = config.security.authorizations.enabled,
            multi_tenancy = config.security.multi_tenancy.checks_enabled,
            "Partition started"
        );

        Ok(Self {
            id,
            topology,
            state: IdentityState::new(),
            resolver: AuthorizationResolver::new(config.security),
            keys,
            distributor,
            scheduler: RedistributionScheduler::new(config.distribution),
            log: RecordLog::new(id),
            clock,
        })
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn state(&self) -> &IdentityState {
        &self.state
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        self.state.snapshot()
    }

    pub fn resolver(&self) -> &AuthorizationResolver {
        &self.resolver
    }

    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    pub fn distributor(&self) -> &CommandDistributor<DistributedCommand> {
        &self.distributor
    }

    pub fn metrics(&self) -> &DistributionMetrics {
        self.distributor.metrics()
    }

    /// No outgoing distribution awaits acknowledgment
    pub fn is_idle(&self) -> bool {
        self.distributor.is_idle()
    }

    /// Process one command issued by `principal`. Identity commands are only
    /// accepted on the coordinator, which applies them and distributes them
    /// to every other partition on the identity queue.
    pub fn submit(&mut self, command: Command, principal: &Principal) -> Result<CommandOutcome> {
        let now = self.clock.now_millis();
        self.log.append_command(UNASSIGNED_KEY, &command, now);

        let processed = if command.is_distributed() && self.id != self.topology.coordinator() {
            Err(self.not_coordinator(&command))
        } else {
            let ctx = ProcessingContext::new(&self.state, &self.resolver, &self.keys, principal);
            processors::process(&ctx, command.clone())
        };
        let processed = match processed {
            Ok(processed) => processed,
            Err(rejection) => {
                debug!(
                    partition = self.id,
                    value_type = %command.value_type(),
                    intent = %command.intent(),
                    rejection_type = %rejection.rejection_type,
                    reason = %rejection.reason,
                    "Command rejected"
                );
                self.log.append_rejection(&command, rejection.clone(), now);
                return Ok(CommandOutcome::Rejected(rejection));
            }
        };

        appliers::apply(&mut self.state, &processed.command, &self.keys);
        self.log.append_event(processed.key, &processed.command, now);

        let distribution_key = if processed.command.is_distributed() {
            let distributed = DistributedCommand {
                key: processed.key,
                command: processed.command.clone(),
            };
            match self.distributor.distribute(
                distributed,
                Some(QueueId::identity()),
                self.topology.other_partitions(self.id),
            ) {
                Ok(key) => Some(key),
                Err(e) => {
                    // The command is already applied here; report it as accepted
                    error!(
                        partition = self.id,
                        key = processed.key,
                        error = %e,
                        "Failed to distribute accepted command"
                    );
                    None
                }
            }
        } else {
            None
        };
        self.flush_distribution_records();

        debug!(
            partition = self.id,
            key = processed.key,
            value_type = %processed.command.value_type(),
            intent = %processed.command.event_intent(),
            "Command accepted"
        );

        Ok(CommandOutcome::Accepted {
            key: processed.key,
            command: processed.command,
            distribution_key,
        })
    }

    /// Handle a message from another partition: apply a distributed command
    /// and acknowledge it, or record an acknowledgment
    pub fn handle_message(&mut self, payload: &[u8]) -> Result<()> {
        if let Some(incoming) = self.distributor.receive(payload)? {
            if !incoming.duplicate {
                let DistributedCommand { key, command } = &incoming.command;
                appliers::apply(&mut self.state, command, &self.keys);
                self.log.append_event(*key, command, self.clock.now_millis());
                debug!(
                    partition = self.id,
                    origin = incoming.origin,
                    distribution_key = incoming.distribution_key,
                    value_type = %command.value_type(),
                    "Applied distributed command"
                );
            }
            self.distributor.acknowledge_delivery(&incoming)?;
        }
        self.flush_distribution_records();
        Ok(())
    }

    /// Resend stalled distributions if the scan interval elapsed
    pub fn redistribute(&mut self) -> Result<usize> {
        let resent = self.scheduler.tick(&mut self.distributor)?;
        self.flush_distribution_records();
        Ok(resent)
    }

    /// Identity commands are applied on the coordinator first; other
    /// partitions only receive them through distribution
    fn not_coordinator(&self, command: &Command) -> Rejection {
        Rejection::invalid_argument(format!(
            "Expected to process command '{}.{}' on partition '{}', but identity commands are only accepted by the coordinator partition '{}'",
            command.value_type(),
            command.intent(),
            self.id,
            self.topology.coordinator()
        ))
    }

    fn flush_distribution_records(&mut self) {
        for event in self.distributor.drain_events() {
            self.log.append_distribution(event);
        }
    }
}
