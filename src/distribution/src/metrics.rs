//! Prometheus metrics for command distribution

use crate::error::Result;
use keystone_core::PartitionId;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Distribution metrics of one partition
pub struct DistributionMetrics {
    /// Distributions started on this partition
    pub started: IntCounter,

    /// Sends to target partitions, retries included
    pub sent: IntCounter,

    /// Sends triggered by the redistribution scheduler
    pub retried: IntCounter,

    /// Target acknowledgments received
    pub acknowledged: IntCounter,

    /// Distributions that reached FINISHED
    pub finished: IntCounter,

    /// Distributed commands received a second time
    pub duplicates_received: IntCounter,

    /// Distributions not yet finished
    pub pending: IntGauge,

    /// Time from STARTED to FINISHED in milliseconds
    pub completion_time: Histogram,

    registry: Arc<Registry>,
}

impl DistributionMetrics {
    pub fn new(partition_id: PartitionId) -> Result<Self> {
        let registry = Registry::new();
        let partition = partition_id.to_string();

        let counter = |name: &str, help: &str| -> Result<IntCounter> {
            let counter = IntCounter::with_opts(
                Opts::new(name, help)
                    .namespace("keystone")
                    .const_label("partition", partition.as_str()),
            )?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let started = counter("distribution_started_total", "Distributions started")?;
        let sent = counter("distribution_sent_total", "Distribution sends, retries included")?;
        let retried = counter("distribution_retried_total", "Distribution resends by the scheduler")?;
        let acknowledged = counter("distribution_acknowledged_total", "Target acknowledgments received")?;
        let finished = counter("distribution_finished_total", "Distributions finished")?;
        let duplicates_received = counter(
            "distribution_duplicates_received_total",
            "Distributed commands received more than once",
        )?;

        let pending = IntGauge::with_opts(
            Opts::new("distribution_pending", "Distributions not yet finished")
                .namespace("keystone")
                .const_label("partition", partition.as_str()),
        )?;
        registry.register(Box::new(pending.clone()))?;

        let completion_time = Histogram::with_opts(
            HistogramOpts::new(
                "distribution_completion_time_ms",
                "Time from STARTED to FINISHED in milliseconds",
            )
            .namespace("keystone")
            .const_label("partition", partition.as_str())
            .buckets(vec![
                1.0, 10.0, 50.0, 100.0, 500.0, 1_000.0, 10_000.0, 60_000.0, 300_000.0,
            ]),
        )?;
        registry.register(Box::new(completion_time.clone()))?;

        Ok(Self {
            started,
            sent,
            retried,
            acknowledged,
            finished,
            duplicates_received,
            pending,
            completion_time,
            registry: Arc::new(registry),
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
