//! Search hits and relevance judgments.
//!
//! Hits arrive from search-engine connectors as open field maps; the core
//! only cares about the document identifier under
//! [`config::ID_FIELD`](crate::config::ID_FIELD). Judgments are an
//! already-materialized mapping from document id to a human-assigned
//! relevance grade; how they were sourced is a collaborator concern.

use crate::config::{ID_FIELD, RELEVANCE_THRESHOLD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One ranked result returned by a search system for a query.
///
/// An open mapping of field name to value. Besides the id field the engine
/// treats the content as opaque; extra fields (scores, stored fields,
/// highlighting) pass through untouched for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHit {
    fields: HashMap<String, Value>,
}

impl SearchHit {
    /// Builds a hit from an already-parsed field map.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds a hit carrying only a document identifier.
    pub fn with_id(doc_id: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(ID_FIELD.to_string(), Value::String(doc_id.into()));
        Self { fields }
    }

    /// Returns a field value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Document identifier under the configured id field.
    ///
    /// Numeric identifiers are rendered in their decimal string form so
    /// that they can match string-keyed judgments. A hit with no usable id
    /// is not an error: it simply cannot match any judgment.
    pub fn doc_id(&self) -> Option<String> {
        match self.fields.get(ID_FIELD)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Human relevance judgments for one query: document id to grade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Judgments {
    grades: HashMap<String, u32>,
}

impl Judgments {
    /// An empty judgment set (every document non-relevant).
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the grade for a document, replacing any previous grade.
    pub fn insert(&mut self, doc_id: impl Into<String>, grade: u32) {
        self.grades.insert(doc_id.into(), grade);
    }

    /// Grade assigned to a document; unjudged documents are grade 0.
    pub fn grade(&self, doc_id: &str) -> u32 {
        self.grades.get(doc_id).copied().unwrap_or(0)
    }

    /// Whether a document counts as relevant (grade above the threshold).
    pub fn is_relevant(&self, doc_id: &str) -> bool {
        self.grade(doc_id) > RELEVANCE_THRESHOLD
    }

    /// Number of judged-relevant documents; the recall denominator.
    pub fn relevant_count(&self) -> usize {
        self.grades
            .values()
            .filter(|grade| **grade > RELEVANCE_THRESHOLD)
            .count()
    }

    /// Number of judged documents, relevant or not.
    pub fn len(&self) -> usize {
        self.grades.len()
    }

    /// True when no document has been judged.
    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }
}

impl FromIterator<(String, u32)> for Judgments {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self {
            grades: iter.into_iter().collect(),
        }
    }
}
