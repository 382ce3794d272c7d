//! Domain types shared by the lexical, dense and rerank engines.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Position of a document in its corpus. Insertion order is identity.
pub type DocId = usize;

/// Position of a query in the grouped query sequence.
pub type QueryId = usize;

/// Immutable, cheaply clonable sequence of document texts.
///
/// Every index built over a `Corpus` keeps the same ordering, so a `DocId`
/// means the same document in the lexical index, the vector index and the
/// ground truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    docs: Arc<[String]>,
}

impl Corpus {
    pub fn new(docs: Vec<String>) -> Self {
        Self { docs: docs.into() }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: DocId) -> Option<&str> {
        self.docs.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.docs
    }

    /// First `n` documents as a new corpus (ids are unchanged).
    pub fn truncated(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self::new(self.docs[..n].to_vec())
    }
}

impl Index<DocId> for Corpus {
    type Output = str;

    fn index(&self, id: DocId) -> &str {
        &self.docs[id]
    }
}

impl From<Vec<String>> for Corpus {
    fn from(docs: Vec<String>) -> Self {
        Self::new(docs)
    }
}

/// A question paired with the documents considered correct answers.
///
/// The answer set is never empty and holds no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub id: QueryId,
    pub text: String,
    answers: BTreeSet<DocId>,
}

impl Query {
    pub fn new(id: QueryId, text: impl Into<String>, answers: impl IntoIterator<Item = DocId>) -> Result<Self> {
        let answers: BTreeSet<DocId> = answers.into_iter().collect();
        if answers.is_empty() {
            return Err(Error::EmptyAnswers(id));
        }
        Ok(Self { id, text: text.into(), answers })
    }

    pub fn answers(&self) -> &BTreeSet<DocId> {
        &self.answers
    }
}

/// One `(document, score)` pair of a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub id: DocId,
    pub score: f32,
}

/// Descending score, ascending id on ties. NaN scores sort last.
pub fn rank_order(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or_else(|| a.score.is_nan().cmp(&b.score.is_nan()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Up to `k` documents ordered by descending score, ties by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredDoc>,
}

impl RetrievalResult {
    /// Sorts `hits` into rank order and keeps the best `k`.
    pub fn top_k(mut hits: Vec<ScoredDoc>, k: usize) -> Self {
        hits.sort_by(rank_order);
        hits.truncate(k);
        Self { hits }
    }

    pub fn hits(&self) -> &[ScoredDoc] {
        &self.hits
    }

    pub fn ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|h| h.id).collect()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn first(&self) -> Option<&ScoredDoc> {
        self.hits.first()
    }

    pub fn into_hits(self) -> Vec<ScoredDoc> {
        self.hits
    }
}

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Lexical,
    Dense,
    Rerank,
}

impl Strategy {
    /// Evaluation order. Output series are indexed by this order.
    pub const ALL: [Strategy; 3] = [Strategy::Lexical, Strategy::Dense, Strategy::Rerank];

    pub fn index(self) -> usize {
        match self {
            Strategy::Lexical => 0,
            Strategy::Dense => 1,
            Strategy::Rerank => 2,
        }
    }

    /// Label used in reports and plots.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Lexical => "BM25",
            Strategy::Dense => "DPR",
            Strategy::Rerank => "Reranking",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
