//! Prometheus-backed metrics registry and snapshot helpers.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry owned by one session.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    active_transfers: IntGauge,
    store_failures_total: IntCounterVec,
    resume_data_total: IntCounterVec,
    alerts_processed_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Registered transfers when the latest status batch was handled.
    pub active_transfers: i64,
    /// Alerts handled by the session worker.
    pub alerts_processed_total: u64,
    /// Resume blobs persisted at shutdown.
    pub resume_data_saved: u64,
    /// Resume requests that failed or could not be persisted.
    pub resume_data_failed: u64,
    /// Resume requests abandoned at the drain deadline.
    pub resume_data_abandoned: u64,
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = collector(
            "events_emitted_total",
            IntCounterVec::new(
                Opts::new("events_emitted_total", "Session events emitted by type"),
                &["type"],
            ),
        )?;
        let active_transfers = collector(
            "active_transfers",
            IntGauge::with_opts(Opts::new(
                "active_transfers",
                "Transfers reported by the latest status batch",
            )),
        )?;
        let store_failures_total = collector(
            "store_failures_total",
            IntCounterVec::new(
                Opts::new(
                    "store_failures_total",
                    "Durable store writes that failed during alert handling",
                ),
                &["operation"],
            ),
        )?;
        let resume_data_total = collector(
            "resume_data_total",
            IntCounterVec::new(
                Opts::new(
                    "resume_data_total",
                    "Shutdown resume-data requests by outcome",
                ),
                &["outcome"],
            ),
        )?;
        let alerts_processed_total = collector(
            "alerts_processed_total",
            IntCounter::with_opts(Opts::new(
                "alerts_processed_total",
                "Engine alerts handled by the session worker",
            )),
        )?;

        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "active_transfers", &active_transfers)?;
        register(&registry, "store_failures_total", &store_failures_total)?;
        register(&registry, "resume_data_total", &resume_data_total)?;
        register(&registry, "alerts_processed_total", &alerts_processed_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                active_transfers,
                store_failures_total,
                resume_data_total,
                alerts_processed_total,
            }),
        })
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Emitted events of one type so far.
    #[must_use]
    pub fn events_emitted(&self, event_type: &str) -> u64 {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .get()
    }

    /// Set the active transfer gauge.
    pub fn set_active_transfers(&self, count: i64) {
        self.inner.active_transfers.set(count);
    }

    /// Increment the store failure counter for an operation.
    pub fn inc_store_failure(&self, operation: &str) {
        self.inner
            .store_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Store failures recorded for an operation.
    #[must_use]
    pub fn store_failures(&self, operation: &str) -> u64 {
        self.inner
            .store_failures_total
            .with_label_values(&[operation])
            .get()
    }

    /// Record the outcome (`saved`, `failed`, `abandoned`) of resume requests.
    pub fn add_resume_outcome(&self, outcome: &str, count: u64) {
        self.inner
            .resume_data_total
            .with_label_values(&[outcome])
            .inc_by(count);
    }

    /// Increment the processed alert counter.
    pub fn inc_alerts_processed(&self) {
        self.inner.alerts_processed_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let resume = |outcome: &str| {
            self.inner
                .resume_data_total
                .with_label_values(&[outcome])
                .get()
        };
        MetricsSnapshot {
            active_transfers: self.inner.active_transfers.get(),
            alerts_processed_total: self.inner.alerts_processed_total.get(),
            resume_data_saved: resume("saved"),
            resume_data_failed: resume("failed"),
            resume_data_abandoned: resume("abandoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_event("transfer.added");
        metrics.inc_event("transfer.added");
        metrics.set_active_transfers(3);
        metrics.inc_store_failure("upsert_transfer");
        metrics.add_resume_outcome("saved", 2);
        metrics.add_resume_outcome("failed", 1);
        metrics.inc_alerts_processed();

        assert_eq!(metrics.events_emitted("transfer.added"), 2);
        assert_eq!(metrics.store_failures("upsert_transfer"), 1);
        assert_eq!(metrics.store_failures("delete_transfer"), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_transfers, 3);
        assert_eq!(snapshot.alerts_processed_total, 1);
        assert_eq!(snapshot.resume_data_saved, 2);
        assert_eq!(snapshot.resume_data_failed, 1);
        assert_eq!(snapshot.resume_data_abandoned, 0);

        let rendered = metrics.render()?;
        assert!(rendered.contains("events_emitted_total"));
        assert!(rendered.contains("store_failures_total"));
        assert!(rendered.contains("resume_data_total"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.set_active_transfers(7);
        assert_eq!(second.snapshot().active_transfers, 0);
        Ok(())
    }
}
