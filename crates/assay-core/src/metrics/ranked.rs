//! Collecting metrics derived from a stream of ranked hits.
//!
//! One [`RankedMetric`] instance embodies one formula at one rank window
//! (`P@3`, `R@10`, `F1@100`, ...). It keeps an independent accumulation
//! state per version, created on the first hit collected for that version.
//!
//! The rank-ordering contract (1-based, strictly increasing per version)
//! is enforced by the owning query before hits reach this module; a metric
//! has no way to reorder a stream after the fact.

use crate::hit::{Judgments, SearchHit};
use crate::math::Decimal;
use std::collections::HashMap;

/// Formula selector for a ranked metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Relevant hits among the first `k` ranks, over `k`.
    ///
    /// The denominator stays `k` even when fewer than `k` hits are ever
    /// collected: missing hits count as non-relevant.
    PrecisionAt {
        /// Rank window.
        k: usize,
    },
    /// Relevant hits among the first `k` ranks, over the judged-relevant
    /// total. Zero when there are no judgments.
    RecallAt {
        /// Rank window.
        k: usize,
    },
    /// Weighted harmonic mean of precision and recall at the same `k`:
    /// `(1+β²)·P·R / (β²·P + R)`, zero when the denominator is zero.
    FMeasureAt {
        /// Recall weight; β = 1 balances precision and recall.
        beta: u32,
        /// Rank window shared by the precision and recall terms.
        k: usize,
    },
    /// Mean, over the judged-relevant documents, of the precision at each
    /// rank where a relevant hit appears. Zero when there are no judgments.
    AveragePrecision,
    /// Inverse rank of the first relevant hit at rank ≤ `k`, else zero.
    ReciprocalRankAt {
        /// Rank window.
        k: usize,
    },
}

impl MetricKind {
    /// Ranks at or below this bound count toward the metric's window.
    fn window(&self) -> u64 {
        match *self {
            MetricKind::PrecisionAt { k }
            | MetricKind::RecallAt { k }
            | MetricKind::FMeasureAt { k, .. } => k as u64,
            MetricKind::AveragePrecision | MetricKind::ReciprocalRankAt { .. } => u64::MAX,
        }
    }

    /// Computes the metric value from a version's accumulated state.
    fn value(&self, window: &HitWindow) -> Decimal {
        match *self {
            MetricKind::PrecisionAt { k } => ratio(window.relevant_in_window, k as u64),
            MetricKind::RecallAt { .. } => {
                ratio(window.relevant_in_window, window.relevant_total)
            }
            MetricKind::FMeasureAt { beta, k } => {
                let precision = ratio(window.relevant_in_window, k as u64);
                let recall = ratio(window.relevant_in_window, window.relevant_total);
                f_measure(precision, recall, beta)
            }
            MetricKind::AveragePrecision => {
                if window.relevant_total == 0 {
                    Decimal::ZERO
                } else {
                    window
                        .precision_sum
                        .divide(Decimal::from_count(window.relevant_total))
                }
            }
            MetricKind::ReciprocalRankAt { k } => match window.first_relevant_rank {
                Some(rank) if rank <= k as u64 => Decimal::ONE.divide(Decimal::from_count(rank)),
                _ => Decimal::ZERO,
            },
        }
    }
}

/// Guarded ratio of two counts; empty denominators evaluate to zero
/// instead of reaching the numeric engine.
fn ratio(numerator: u64, denominator: u64) -> Decimal {
    if denominator == 0 {
        Decimal::ZERO
    } else {
        Decimal::from_count(numerator).divide(Decimal::from_count(denominator))
    }
}

/// `(1+β²)·P·R / (β²·P + R)`, zero when the denominator is zero.
fn f_measure(precision: Decimal, recall: Decimal, beta: u32) -> Decimal {
    let beta_squared = Decimal::from_count(beta as u64 * beta as u64);
    let denominator = beta_squared.multiply(precision).sum(recall);
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    let numerator = Decimal::ONE
        .sum(beta_squared)
        .multiply(precision)
        .multiply(recall);
    numerator.divide(denominator)
}

/// Streaming accumulation state for one (metric, version) pair.
#[derive(Debug, Clone, Default)]
struct HitWindow {
    /// Relevant hits seen at ranks within the metric's window.
    relevant_in_window: u64,
    /// Relevant hits seen anywhere in the stream so far.
    relevant_seen: u64,
    /// Rank of the first relevant hit, if any.
    first_relevant_rank: Option<u64>,
    /// Sum of the precision values at each relevant rank.
    precision_sum: Decimal,
    /// Judged-relevant total as of the last collected hit.
    relevant_total: u64,
}

/// A metric whose value is derived from a stream of ranked hits.
#[derive(Debug, Clone)]
pub struct RankedMetric {
    name: String,
    kind: MetricKind,
    versions: HashMap<String, HitWindow>,
}

impl RankedMetric {
    /// Builds a new metric with no per-version state.
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            versions: HashMap::new(),
        }
    }

    /// Stable metric identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The formula this metric computes.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Streams one ranked hit into the accumulation state for `version`,
    /// creating that state on first use.
    ///
    /// Hits beyond the metric's rank window are accepted (the stream must
    /// be exhausted) but do not affect the windowed counters. A hit whose
    /// id is absent from `judgments`, or has no id at all, scores as
    /// non-relevant.
    pub fn collect(&mut self, hit: &SearchHit, rank: u64, version: &str, judgments: &Judgments) {
        let window = self.versions.entry(version.to_string()).or_default();
        window.relevant_total = judgments.relevant_count() as u64;

        let relevant = hit
            .doc_id()
            .map(|id| judgments.is_relevant(&id))
            .unwrap_or(false);
        if !relevant {
            return;
        }

        window.relevant_seen += 1;
        if rank <= self.kind.window() {
            window.relevant_in_window += 1;
        }
        if window.first_relevant_rank.is_none() {
            window.first_relevant_rank = Some(rank);
        }
        // Precision at this rank: relevant seen so far over the rank. Valid
        // because ranks arrive strictly increasing.
        window.precision_sum = window
            .precision_sum
            .sum(ratio(window.relevant_seen, rank));
    }

    /// Finished value for `version`; `None` if no hit was ever collected
    /// for that version.
    pub fn value(&self, version: &str) -> Option<Decimal> {
        self.versions
            .get(version)
            .map(|window| self.kind.value(window))
    }

    /// Versions with collected state, in arbitrary order.
    pub(crate) fn versions(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }
}
