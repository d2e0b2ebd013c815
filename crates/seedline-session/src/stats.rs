//! Metric descriptor table mapping statistic names to counter slots.

use std::collections::BTreeMap;

use seedline_events::SessionStatistics;
use seedline_torrent_core::{MetricKind, StatsMetric};

/// Counter slot and classification for one named statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Index into a counter snapshot.
    pub value_index: usize,
    /// Counter classification.
    pub kind: MetricKind,
}

/// Read-only name → descriptor table, built once per session.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    descriptors: BTreeMap<String, MetricDescriptor>,
}

impl StatsTable {
    /// Build the table from an engine statistics catalogue.
    #[must_use]
    pub fn new(metrics: impl IntoIterator<Item = StatsMetric>) -> Self {
        let descriptors = metrics
            .into_iter()
            .map(|metric| {
                (
                    metric.name,
                    MetricDescriptor {
                        value_index: metric.value_index,
                        kind: metric.kind,
                    },
                )
            })
            .collect();
        Self { descriptors }
    }

    /// Descriptor for a named statistic.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&MetricDescriptor> {
        self.descriptors.get(name)
    }

    /// Number of known statistics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the catalogue was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Statistic names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Translate a counter snapshot into named values. Statistics whose slot
    /// lies outside `counters` are omitted.
    #[must_use]
    pub fn extract(&self, counters: &[i64]) -> SessionStatistics {
        self.descriptors
            .iter()
            .filter_map(|(name, descriptor)| {
                counters
                    .get(descriptor.value_index)
                    .map(|value| (name.clone(), *value))
            })
            .collect()
    }
}
