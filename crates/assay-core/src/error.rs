//! Error types for assay-core.
//!
//! The engine never uses errors for control flow: missing judgments score
//! as non-relevant and empty windows evaluate to zero. Errors surface only
//! caller contract violations, and always before any shared aggregate
//! state has been touched.

use thiserror::Error;

/// Errors surfaced by the evaluation tree and its metrics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// A member handle does not resolve to a node in this tree.
    #[error("unknown member handle: {0}")]
    UnknownMember(String),
    /// The operation requires a query (leaf) member.
    #[error("member is not a query: {0}")]
    NotAQuery(String),
    /// Queries are leaves; find-or-create below one is invalid.
    #[error("children not allowed under query: {0}")]
    ChildrenNotAllowed(String),
    /// The caller violated an input contract (rank ordering, empty names).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
