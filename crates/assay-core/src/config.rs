//! Production configuration constants.
//!
//! Constants that define how the evaluation engine interprets search hits
//! and judgments, and which metric instances every query is born with.
//! They live here rather than in a configuration file because collaborators
//! (connectors, servers) own config parsing; the core only needs the values
//! to agree with the wire formats those collaborators produce.

/// Hit field holding the document identifier.
///
/// Matches the `_id` field emitted by the Elasticsearch and Solr
/// connectors. A hit without this field can never match a judgment and is
/// scored as non-relevant.
pub const ID_FIELD: &str = "_id";

/// Number of fractional digits carried by every metric value.
///
/// All arithmetic in [`math`](crate::math) happens at this scale with
/// ceiling rounding, which keeps repeated aggregation bit-exact across
/// runs and thread interleavings.
pub const DECIMAL_SCALE: u32 = 4;

/// A judged document is relevant when its grade is strictly greater than
/// this threshold. Unjudged documents carry an implicit grade of 0.
pub const RELEVANCE_THRESHOLD: u32 = 0;

/// Rank windows for the shipped precision metrics (`P@1`, `P@3`, `P@10`).
pub const PRECISION_K_VALUES: &[usize] = &[1, 3, 10];

/// Rank windows for the shipped recall metrics (`R@3`, `R@10`).
pub const RECALL_K_VALUES: &[usize] = &[3, 10];

/// Rank windows for the shipped F1 metrics (`F1@3`, `F1@10`, `F1@100`).
/// All shipped F-measures balance precision and recall with β = 1.
pub const F1_K_VALUES: &[usize] = &[3, 10, 100];

/// Rank window for the shipped reciprocal-rank metric (`RR@10`).
pub const RECIPROCAL_RANK_K: usize = 10;
