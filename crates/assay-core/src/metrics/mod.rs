//! Metric abstractions: value holders, behavior variants, and the shipped
//! metric set.
//!
//! A [`Metric`] is a named measurement owned by exactly one domain member.
//! The three variants form a flat tagged union rather than an inheritance
//! chain:
//!
//! - [`RankedMetric`] derives its value from a stream of ranked hits
//!   (queries).
//! - [`AveragedMetric`] accumulates already-computed values into a running
//!   mean (ancestors being fed by propagation).
//! - [`StaticMetric`] stores externally supplied values verbatim (tree
//!   rebuilds from persisted data).
//!
//! Each variant holds one [`ValueFactory`] per version string, created on
//! the first collection for that version. Versions never interact: a
//! collect for `"v2"` cannot change a `"v1"` value.

mod averaged;
mod ranked;
mod static_value;

pub use averaged::AveragedMetric;
pub use ranked::{MetricKind, RankedMetric};
pub use static_value::StaticMetric;

use crate::config;
use crate::math::Decimal;
use once_cell::sync::Lazy;

/// Per-(metric, version) value holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFactory {
    /// Value fixed at construction; read-only thereafter. The finished
    /// snapshot of a collecting metric, or a static ingested value.
    Fixed(Decimal),
    /// Accumulating holder: a running sum and contribution count whose
    /// `value` is the current mean. Starts neutral (zero sum, zero count).
    Mutable {
        /// Exact sum of every folded value.
        sum: Decimal,
        /// Number of values folded in so far.
        count: u64,
        /// Current mean, `sum / count` (zero before the first fold).
        value: Decimal,
    },
}

impl ValueFactory {
    /// A neutral accumulating holder.
    pub(crate) fn neutral() -> Self {
        ValueFactory::Mutable {
            sum: Decimal::ZERO,
            count: 0,
            value: Decimal::ZERO,
        }
    }

    /// The numeric value this holder currently produces.
    pub fn value(&self) -> Decimal {
        match self {
            ValueFactory::Fixed(value) => *value,
            ValueFactory::Mutable { value, .. } => *value,
        }
    }

    /// Number of values folded into an accumulating holder; `None` for a
    /// fixed snapshot.
    pub fn contributions(&self) -> Option<u64> {
        match self {
            ValueFactory::Fixed(_) => None,
            ValueFactory::Mutable { count, .. } => Some(*count),
        }
    }

    /// Folds one more value into the running mean.
    ///
    /// The sum stays exact (fixed-scale addition never rounds); the single
    /// ceiling rounding of the divide is re-applied at every fold, so each
    /// intermediate `value` is a valid snapshot and the final mean is
    /// independent of fold order. Folding a fixed holder is a no-op: it is
    /// immutable.
    pub(crate) fn fold(&mut self, additional: Decimal) {
        if let ValueFactory::Mutable { sum, count, value } = self {
            *sum = sum.sum(additional);
            *count += 1;
            *value = sum.divide(Decimal::from_count(*count));
        }
    }
}

/// A named metric owned by exactly one domain member.
///
/// An ancestor's metric of the same name is a different instance (an
/// aggregate over descendants), never a shared reference to a query's.
#[derive(Debug, Clone)]
pub enum Metric {
    /// Derives its value from a stream of ranked hits.
    Ranked(RankedMetric),
    /// Running mean of values propagated from descendant queries.
    Averaged(AveragedMetric),
    /// Externally computed values stored verbatim.
    Static(StaticMetric),
}

impl Metric {
    /// Stable metric identifier, e.g. `P@3`.
    pub fn name(&self) -> &str {
        match self {
            Metric::Ranked(metric) => metric.name(),
            Metric::Averaged(metric) => metric.name(),
            Metric::Static(metric) => metric.name(),
        }
    }

    /// Value holder for `version`; `None` means no data was ever collected
    /// for that version at this node.
    ///
    /// For a ranked metric this is an immutable snapshot of the value
    /// derived from the hits collected so far.
    pub fn value_factory(&self, version: &str) -> Option<ValueFactory> {
        match self {
            Metric::Ranked(metric) => metric.value(version).map(ValueFactory::Fixed),
            Metric::Averaged(metric) => metric.value_factory(version).cloned(),
            Metric::Static(metric) => metric.value_factory(version).cloned(),
        }
    }

    /// Finished value for `version`, if any data was collected.
    pub fn value(&self, version: &str) -> Option<Decimal> {
        self.value_factory(version).map(|factory| factory.value())
    }

    /// Versions this metric has collected data for, sorted for
    /// reproducible iteration.
    pub fn versions(&self) -> Vec<String> {
        let mut versions = match self {
            Metric::Ranked(metric) => metric.versions(),
            Metric::Averaged(metric) => metric.versions(),
            Metric::Static(metric) => metric.versions(),
        };
        versions.sort();
        versions
    }
}

/// Specification of one metric instance a query is born with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    /// Display name, unique within the set (e.g. `P@3`).
    pub name: String,
    /// Formula and rank window.
    pub kind: MetricKind,
}

impl MetricSpec {
    /// Builds a spec from a name and a formula.
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

static DEFAULT_SPECS: Lazy<Vec<MetricSpec>> = Lazy::new(|| {
    let mut specs = Vec::new();
    for &k in config::PRECISION_K_VALUES {
        specs.push(MetricSpec::new(
            format!("P@{k}"),
            MetricKind::PrecisionAt { k },
        ));
    }
    for &k in config::RECALL_K_VALUES {
        specs.push(MetricSpec::new(format!("R@{k}"), MetricKind::RecallAt { k }));
    }
    for &k in config::F1_K_VALUES {
        specs.push(MetricSpec::new(
            format!("F1@{k}"),
            MetricKind::FMeasureAt { beta: 1, k },
        ));
    }
    specs.push(MetricSpec::new("AP", MetricKind::AveragePrecision));
    specs.push(MetricSpec::new(
        format!("RR@{}", config::RECIPROCAL_RANK_K),
        MetricKind::ReciprocalRankAt {
            k: config::RECIPROCAL_RANK_K,
        },
    ));
    specs
});

/// The metric set every query is born with unless the tree was built with
/// an explicit override.
pub fn default_metric_specs() -> &'static [MetricSpec] {
    &DEFAULT_SPECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_names_are_unique() {
        let specs = default_metric_specs();
        let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn test_default_set_covers_shipped_metrics() {
        let names: Vec<&str> = default_metric_specs()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        for expected in ["P@1", "P@3", "P@10", "R@3", "R@10", "F1@3", "F1@10", "F1@100", "AP", "RR@10"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_mutable_factory_starts_neutral() {
        let factory = ValueFactory::neutral();
        assert_eq!(factory.value(), Decimal::ZERO);
        assert_eq!(factory.contributions(), Some(0));
    }

    #[test]
    fn test_fixed_factory_ignores_folds() {
        let mut factory = ValueFactory::Fixed(Decimal::ONE);
        factory.fold(Decimal::ZERO);
        assert_eq!(factory.value(), Decimal::ONE);
        assert_eq!(factory.contributions(), None);
    }
}
