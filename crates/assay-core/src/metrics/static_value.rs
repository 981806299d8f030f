//! Ingestion-only metric for already-computed values.

use super::ValueFactory;
use crate::math::Decimal;
use std::collections::HashMap;
use tracing::warn;

/// A metric whose values arrive already computed (replayed from storage)
/// instead of being derived from hits.
///
/// Each version's value is an immutable snapshot with set-once semantics:
/// a second store for the same version is ignored. This lets an
/// aggregation tree be rebuilt uniformly from persisted data without
/// re-deriving precision or recall from raw hit streams.
#[derive(Debug, Clone)]
pub struct StaticMetric {
    name: String,
    versions: HashMap<String, ValueFactory>,
}

impl StaticMetric {
    /// Builds a new static metric with no stored values.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: HashMap::new(),
        }
    }

    /// Stable metric identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `value` as the immutable snapshot for `version`.
    pub fn collect(&mut self, version: &str, value: Decimal) {
        if let Some(existing) = self.versions.get(version) {
            if existing.value() != value {
                warn!(
                    metric = self.name.as_str(),
                    version,
                    existing = %existing.value(),
                    ignored = %value,
                    "ignoring second store into static metric snapshot"
                );
            }
            return;
        }
        self.versions
            .insert(version.to_string(), ValueFactory::Fixed(value));
    }

    /// Value holder for `version`; `None` if nothing was stored.
    pub fn value_factory(&self, version: &str) -> Option<&ValueFactory> {
        self.versions.get(version)
    }

    /// Versions with a stored snapshot, in arbitrary order.
    pub(crate) fn versions(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }
}
