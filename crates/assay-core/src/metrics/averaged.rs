//! Running-mean metric fed by aggregation propagation.

use super::ValueFactory;
use crate::math::Decimal;
use std::collections::HashMap;

/// A metric whose value is the mathematical mean of values collected from
/// other metrics, one accumulator per version.
///
/// Ancestor members hold one of these per metric name; every descendant
/// query that finishes propagation folds its finished value in. The
/// accumulator keeps the exact running sum and contribution count, so the
/// mean after N folds equals the unweighted arithmetic mean of the N
/// contributions regardless of fold order, and every intermediate state is
/// a valid partial-aggregation snapshot.
#[derive(Debug, Clone)]
pub struct AveragedMetric {
    name: String,
    versions: HashMap<String, ValueFactory>,
}

impl AveragedMetric {
    /// Builds a new averaged metric with the given name and no
    /// contributions.
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

    /// Folds a new value into the running mean for `version`, creating the
    /// neutral accumulator on first use.
    pub fn collect(&mut self, version: &str, additional: Decimal) {
        self.versions
            .entry(version.to_string())
            .or_insert_with(ValueFactory::neutral)
            .fold(additional);
    }

    /// Value holder for `version`; `None` before any contribution.
    pub fn value_factory(&self, version: &str) -> Option<&ValueFactory> {
        self.versions.get(version)
    }

    /// Versions with at least one contribution, in arbitrary order.
    pub(crate) fn versions(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }
}
