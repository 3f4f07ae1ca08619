//! Prometheus counters for relay activity.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Metrics collector.
pub struct RelayMetrics {
    registry: Registry,
    pub batches_reviewed: IntCounter,
    pub batches_forwarded: IntCounter,
    pub batches_rejected: IntCounter,
    pub mediator_updates: IntCounter,
    pub policy_updates: IntCounter,
    pub decode_failures: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> anyhow::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl RelayMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        Ok(Self {
            batches_reviewed: counter(
                &registry,
                "relaygate_batches_reviewed_total",
                "Batches submitted to the guard",
            )?,
            batches_forwarded: counter(
                &registry,
                "relaygate_batches_forwarded_total",
                "Batches forwarded to the timelock",
            )?,
            batches_rejected: counter(
                &registry,
                "relaygate_batches_rejected_total",
                "Batches rejected by the guard",
            )?,
            mediator_updates: counter(
                &registry,
                "relaygate_mediator_updates_total",
                "Mediator registry updates",
            )?,
            policy_updates: counter(
                &registry,
                "relaygate_policy_updates_total",
                "Selector policy entries applied",
            )?,
            decode_failures: counter(
                &registry,
                "relaygate_decode_failures_total",
                "Command buffers that failed to decode",
            )?,
            registry,
        })
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_review(&self, forwarded: bool) {
        self.batches_reviewed.inc();
        if forwarded {
            self.batches_forwarded.inc();
        } else {
            self.batches_rejected.inc();
        }
    }
}
