//! Retrieval quality metrics over completed rankings.

use std::collections::BTreeSet;

use qabench_core::error::{Error, Result};
use qabench_core::types::DocId;

fn hits(answers: &BTreeSet<DocId>, retrieved: &[DocId]) -> usize {
    retrieved.iter().filter(|id| answers.contains(id)).count()
}

/// `|answers ∩ retrieved| / |answers|`.
///
/// Recall is undefined without answers, so an empty set is rejected rather
/// than reported as 0.
pub fn recall_at_k(answers: &BTreeSet<DocId>, retrieved: &[DocId]) -> Result<f64> {
    if answers.is_empty() {
        return Err(Error::InvalidArgument("recall is undefined for an empty answer set".to_string()));
    }
    Ok(hits(answers, retrieved) as f64 / answers.len() as f64)
}

/// `|answers ∩ retrieved| / |retrieved|`, 0 when nothing was retrieved.
pub fn precision_at_k(answers: &BTreeSet<DocId>, retrieved: &[DocId]) -> f64 {
    if retrieved.is_empty() {
        return 0.0;
    }
    hits(answers, retrieved) as f64 / retrieved.len() as f64
}

/// Fraction of positions `i` whose top-1 document is document `i`.
///
/// Only meaningful on an index-aligned corpus. `None` marks a query with no
/// top-1 result and counts as a miss.
pub fn exact_match_ratio(matches: &[Option<DocId>]) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }
    let count = matches.iter().enumerate().filter(|(i, m)| **m == Some(*i)).count();
    count as f64 / matches.len() as f64
}
