//! In-process cluster node
//!
//! Every partition runs in its own task and owns its [`Partition`]
//! exclusively. Partitions reach each other through [`ChannelTransport`];
//! clients reach them through a [`NodeHandle`].

use anyhow::{Context, Result};
use futures::future::join_all;
use keystone_authz::{IdentitySnapshot, Principal};
use keystone_core::{
    ClusterTopology, CoreError, PartitionId, PartitionTransport, SystemClock,
};
use keystone_distribution::DistributionStats;
use keystone_engine::{Command, CommandOutcome, Partition};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::NodeConfig;

/// Request from a client to one partition
pub enum PartitionRequest {
    Submit {
        command: Command,
        principal: Principal,
        reply: oneshot::Sender<keystone_engine::Result<CommandOutcome>>,
    },
    Snapshot {
        reply: oneshot::Sender<IdentitySnapshot>,
    },
    Status {
        reply: oneshot::Sender<PartitionStatus>,
    },
    Metrics {
        reply: oneshot::Sender<keystone_distribution::Result<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatus {
    pub partition_id: PartitionId,
    pub distribution: DistributionStats,
    pub records: usize,
    pub state_version: u64,
}

/// Inter-partition transport over unbounded channels
struct ChannelTransport {
    inbound: Arc<BTreeMap<PartitionId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl PartitionTransport for ChannelTransport {
    fn send(&self, target: PartitionId, payload: Vec<u8>) -> keystone_core::Result<()> {
        self.inbound
            .get(&target)
            .ok_or(CoreError::UnknownPartition(target))?
            .send(payload)
            .map_err(|_| CoreError::transport(format!("partition {target} is not running")))
    }
}

struct PartitionWorker {
    partition: Partition,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    requests: mpsc::Receiver<PartitionRequest>,
    scan_interval: Duration,
    shutdown: CancellationToken,
}

impl PartitionWorker {
    async fn run(mut self) {
        let id = self.partition.id();
        let mut ticker = interval(self.scan_interval);
        info!(partition = id, "Partition worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(payload) = self.inbound.recv() => {
                    if let Err(e) = self.partition.handle_message(&payload) {
                        warn!(partition = id, error = %e, "Failed to handle partition message");
                    }
                }
                Some(request) = self.requests.recv() => self.handle(request),
                _ = ticker.tick() => {
                    match self.partition.redistribute() {
                        Ok(0) => {}
                        Ok(resent) => debug!(partition = id, resent, "Redistributed stalled commands"),
                        Err(e) => error!(partition = id, error = %e, "Redistribution failed"),
                    }
                }
            }
        }

        info!(partition = id, "Partition worker stopped");
    }

    fn handle(&mut self, request: PartitionRequest) {
        // a dropped reply receiver only means the client gave up
        match request {
            PartitionRequest::Submit {
                command,
                principal,
                reply,
            } => {
                let _ = reply.send(self.partition.submit(command, &principal));
            }
            PartitionRequest::Snapshot { reply } => {
                let _ = reply.send(self.partition.snapshot());
            }
            PartitionRequest::Status { reply } => {
                let _ = reply.send(PartitionStatus {
                    partition_id: self.partition.id(),
                    distribution: self.partition.distributor().stats(),
                    records: self.partition.log().len(),
                    state_version: self.partition.state().version(),
                });
            }
            PartitionRequest::Metrics { reply } => {
                let _ = reply.send(self.partition.metrics().export());
            }
        }
    }
}

/// Cloneable client access to the partitions of a running node
#[derive(Clone)]
pub struct NodeHandle {
    topology: ClusterTopology,
    requests: Arc<BTreeMap<PartitionId, mpsc::Sender<PartitionRequest>>>,
}

impl NodeHandle {
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// Submit a command to one partition and wait for its outcome. Identity
    /// commands are rejected anywhere but on the coordinator.
    pub async fn submit(
        &self,
        partition: PartitionId,
        command: Command,
        principal: Principal,
    ) -> Result<CommandOutcome> {
        let outcome = self
            .request(partition, |reply| PartitionRequest::Submit {
                command,
                principal,
                reply,
            })
            .await?;
        Ok(outcome?)
    }

    pub async fn submit_to_coordinator(
        &self,
        command: Command,
        principal: Principal,
    ) -> Result<CommandOutcome> {
        self.submit(self.topology.coordinator(), command, principal)
            .await
    }

    pub async fn snapshot(&self, partition: PartitionId) -> Result<IdentitySnapshot> {
        self.request(partition, |reply| PartitionRequest::Snapshot { reply })
            .await
    }

    pub async fn status(&self, partition: PartitionId) -> Result<PartitionStatus> {
        self.request(partition, |reply| PartitionRequest::Status { reply })
            .await
    }

    /// Distribution metrics of every partition in Prometheus text format
    pub async fn metrics(&self) -> Result<String> {
        let mut text = String::new();
        for partition in self.topology.partitions() {
            let exported = self
                .request(partition, |reply| PartitionRequest::Metrics { reply })
                .await?;
            text.push_str(&exported?);
        }
        Ok(text)
    }

    /// Every partition reports the same identity state
    pub async fn is_converged(&self) -> Result<bool> {
        let mut snapshots = Vec::new();
        for partition in self.topology.partitions() {
            snapshots.push(self.snapshot(partition).await?);
        }
        Ok(snapshots.windows(2).all(|pair| pair[0] == pair[1]))
    }

    async fn request<T>(
        &self,
        partition: PartitionId,
        build: impl FnOnce(oneshot::Sender<T>) -> PartitionRequest,
    ) -> Result<T> {
        let sender = self
            .requests
            .get(&partition)
            .ok_or(CoreError::UnknownPartition(partition))?;
        let (reply, response) = oneshot::channel();
        sender
            .send(build(reply))
            .await
            .map_err(|_| anyhow::anyhow!("partition {partition} is not running"))?;
        response
            .await
            .with_context(|| format!("partition {partition} dropped the request"))
    }
}

/// All partitions of a cluster, run in one process
pub struct KeystoneNode {
    node_id: String,
    config: NodeConfig,
    handle: NodeHandle,
    workers: Vec<PartitionWorker>,
    shutdown: CancellationToken,
}

impl KeystoneNode {
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let node_id = if config.node.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            config.node.id.clone()
        };
        info!(node_id = %node_id, partitions = config.cluster.partitions, "Initializing keystone node");

        let topology = ClusterTopology::new(config.cluster.partitions)?;
        let engine_config = config.engine();
        let shutdown = CancellationToken::new();
        let clock = Arc::new(SystemClock);

        let mut inbound_senders = BTreeMap::new();
        let mut inbound_receivers = BTreeMap::new();
        let mut request_senders = BTreeMap::new();
        let mut request_receivers = BTreeMap::new();
        for id in topology.partitions() {
            let (tx, rx) = mpsc::unbounded_channel();
            inbound_senders.insert(id, tx);
            inbound_receivers.insert(id, rx);
            let (tx, rx) = mpsc::channel(config.cluster.command_buffer);
            request_senders.insert(id, tx);
            request_receivers.insert(id, rx);
        }

        let transport = Arc::new(ChannelTransport {
            inbound: Arc::new(inbound_senders),
        });

        let mut workers = Vec::new();
        for id in topology.partitions() {
            let partition = Partition::new(
                id,
                topology.clone(),
                engine_config.clone(),
                transport.clone(),
                clock.clone(),
            )
            .with_context(|| format!("Failed to create partition {id}"))?;

            let (Some(inbound), Some(requests)) =
                (inbound_receivers.remove(&id), request_receivers.remove(&id))
            else {
                anyhow::bail!("Missing channels for partition {id}");
            };

            workers.push(PartitionWorker {
                partition,
                inbound,
                requests,
                scan_interval: engine_config.distribution.scan_interval(),
                shutdown: shutdown.clone(),
            });
        }

        Ok(Self {
            node_id,
            config,
            handle: NodeHandle {
                topology,
                requests: Arc::new(request_senders),
            },
            workers,
            shutdown,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Cancelling the token stops the node
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run every partition until shutdown is requested
    pub async fn run(mut self) -> Result<()> {
        info!(node_id = %self.node_id, "Starting partition workers");

        let tasks: Vec<_> = std::mem::take(&mut self.workers)
            .into_iter()
            .map(|worker| tokio::spawn(worker.run()))
            .collect();

        if let Some(setup) = self.config.identity_setup() {
            if let Err(e) = self.bootstrap(Command::InitializeIdentity(setup)).await {
                self.shutdown.cancel();
                join_all(tasks).await;
                return Err(e);
            }
        }

        let status = tokio::spawn(Self::report_status(
            self.handle.clone(),
            Duration::from_secs(self.config.node.status_interval_secs),
            self.shutdown.clone(),
        ));

        self.shutdown.cancelled().await;
        info!("Shutdown requested, stopping partition workers");

        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Partition worker panicked");
            }
        }
        status.await.context("Status reporter failed")?;

        info!(node_id = %self.node_id, "Node stopped");
        Ok(())
    }

    async fn bootstrap(&self, command: Command) -> Result<()> {
        let outcome = self
            .handle
            .submit_to_coordinator(command, Principal::internal())
            .await
            .context("Identity setup failed")?;

        match outcome.rejection() {
            None => info!(key = ?outcome.key(), "Identity setup initialized"),
            Some(rejection) => warn!(
                rejection_type = %rejection.rejection_type,
                reason = %rejection.reason,
                "Identity setup rejected"
            ),
        }
        Ok(())
    }

    async fn report_status(handle: NodeHandle, every: Duration, shutdown: CancellationToken) {
        let mut ticker = interval(every);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    for partition in handle.topology().partitions() {
                        match handle.status(partition).await {
                            Ok(status) => info!(
                                partition,
                                pending = status.distribution.pending,
                                queued = status.distribution.queued,
                                records = status.records,
                                state_version = status.state_version,
                                "Partition status"
                            ),
                            Err(e) => warn!(partition, error = %e, "Status unavailable"),
                        }
                    }
                }
            }
        }
    }
}
