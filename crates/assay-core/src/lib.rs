//! # Assay Core
//!
//! Engine for evaluating search-engine relevance. Ranked result lists are
//! compared against human relevance judgments, per-query metrics
//! (precision, recall, F-measure, averaged scores) are computed across
//! multiple system versions, and the results roll up through a
//! corpus/topic hierarchy into an overall quality report.
//!
//! The crate is the metric computation and hierarchical aggregation core:
//! collaborators (REST servers, search-engine connectors, report
//! renderers) produce raw per-query hit lists and consume the finished
//! metric tree. The core performs no I/O and parses no configuration.
//!
//! ## Modules
//!
//! - [`domain`] - The evaluated-entity tree (Evaluation → Corpus → Topic →
//!   QueryGroup → Query), hit ingestion, and bottom-up metric propagation
//! - [`metrics`] - Metric variants (collecting, averaged, static) and
//!   per-version value holders
//! - [`math`] - Fixed-scale decimal arithmetic with deterministic rounding
//! - [`hit`] - Search hits and relevance judgments
//! - [`config`] - Production configuration constants
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use assay_core::{EvaluationTree, Judgments, SearchHit};
//!
//! let tree = EvaluationTree::new("nightly");
//! let corpus = tree.find_or_create(tree.root(), "electronics")?;
//! let topic = tree.find_or_create(corpus, "cables")?;
//! let group = tree.find_or_create(topic, "hdmi")?;
//! let query = tree.find_or_create(group, "4k hdmi cable")?;
//!
//! let judgments: Judgments = [("doc1".to_string(), 3)].into_iter().collect();
//! tree.set_judgments(query, judgments)?;
//! tree.set_total_hits(query, "v1.0", 2)?;
//! tree.collect(query, SearchHit::with_id("doc1"), 1, "v1.0")?;
//! tree.collect(query, SearchHit::with_id("doc2"), 2, "v1.0")?;
//! tree.notify_collected_metrics(query)?;
//!
//! let precision = tree.value(corpus, "P@1", "v1.0")?;
//! assert_eq!(precision.map(|v| v.to_f64()), Some(1.0));
//! # Ok::<(), assay_core::EvaluationError>(())
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod hit;
pub mod math;
pub mod metrics;

pub use domain::{EvaluationTree, MemberId, MemberKind};
pub use error::EvaluationError;
pub use hit::{Judgments, SearchHit};
pub use math::Decimal;
pub use metrics::{
    default_metric_specs, AveragedMetric, Metric, MetricKind, MetricSpec, RankedMetric,
    StaticMetric, ValueFactory,
};
