//! Grouping of raw question/answer rows into a corpus, queries and ground truth.
//!
//! Rows arrive already parsed (one row per question/answer pair). Answers are
//! deduplicated into the corpus in first-seen order; rows sharing a
//! `question_id` collapse into one query whose answer set is the union of the
//! rows' answers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Corpus, DocId, Query, QueryId};

/// One raw question/answer pair as handed over by the loader collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRow {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub label: Option<i64>,
}

/// Expected answers of one query, keyed by `QueryId` in [`GroundTruth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundTruthEntry {
    pub question: String,
    pub answers: BTreeSet<DocId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroundTruth {
    entries: BTreeMap<QueryId, GroundTruthEntry>,
}

impl GroundTruth {
    pub fn from_queries(queries: &[Query]) -> Self {
        let entries = queries
            .iter()
            .map(|q| (q.id, GroundTruthEntry { question: q.text.clone(), answers: q.answers().clone() }))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: QueryId) -> Option<&GroundTruthEntry> {
        self.entries.get(&id)
    }

    /// Looks a question up by its exact text.
    pub fn find_by_question(&self, question: &str) -> Result<(QueryId, &GroundTruthEntry)> {
        self.entries
            .iter()
            .find(|(_, e)| e.question == question)
            .map(|(id, e)| (*id, e))
            .ok_or_else(|| Error::QueryNotFound(question.to_string()))
    }

    /// Answers for `query`: by id first, then by question text.
    pub fn answers_for(&self, query: &Query) -> Result<&BTreeSet<DocId>> {
        match self.entries.get(&query.id) {
            Some(entry) => Ok(&entry.answers),
            None => self.find_by_question(&query.text).map(|(_, e)| &e.answers),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads a JSON array of [`QaRow`].
pub fn read_rows(path: &Path) -> Result<Vec<QaRow>> {
    let raw = std::fs::read_to_string(path)?;
    let rows: Vec<QaRow> = serde_json::from_str(&raw)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "loaded dataset rows");
    Ok(rows)
}

/// Corpus, grouped queries and ground truth, built once and never mutated.
#[derive(Debug, Clone)]
pub struct Dataset {
    corpus: Corpus,
    queries: Vec<Query>,
    ground_truth: GroundTruth,
}

impl Dataset {
    /// Groups raw rows. With `positives_only`, rows whose label is present and
    /// not `1` do not contribute answers (their text still joins the corpus).
    pub fn from_rows(rows: &[QaRow], positives_only: bool) -> Result<Self> {
        let mut corpus: Vec<String> = Vec::new();
        let mut doc_ids: HashMap<&str, DocId> = HashMap::new();
        let mut query_ids: HashMap<&str, QueryId> = HashMap::new();
        let mut grouped: Vec<(String, BTreeSet<DocId>)> = Vec::new();

        for row in rows {
            let doc_id = *doc_ids.entry(row.answer.as_str()).or_insert_with(|| {
                corpus.push(row.answer.clone());
                corpus.len() - 1
            });
            let query_id = *query_ids.entry(row.question_id.as_str()).or_insert_with(|| {
                grouped.push((row.question.clone(), BTreeSet::new()));
                grouped.len() - 1
            });
            let entry = &mut grouped[query_id];
            // Later rows overwrite the question text, like the loader did.
            entry.0.clone_from(&row.question);
            if !positives_only || row.label.map_or(true, |l| l == 1) {
                entry.1.insert(doc_id);
            }
        }

        let queries = grouped
            .into_iter()
            .enumerate()
            .map(|(id, (question, answers))| Query::new(id, question, answers))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(rows = rows.len(), docs = corpus.len(), queries = queries.len(), "grouped dataset rows");
        Ok(Self::from_parts(Corpus::new(corpus), queries))
    }

    /// Index-aligned corpus: question i is answered by passage i.
    pub fn aligned(questions: Vec<String>, passages: Vec<String>) -> Result<Self> {
        if questions.len() != passages.len() {
            return Err(Error::InvalidArgument(format!(
                "aligned dataset needs as many questions ({}) as passages ({})",
                questions.len(),
                passages.len()
            )));
        }
        let queries = questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| Query::new(i, q, [i]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(Corpus::new(passages), queries))
    }

    /// Index-aligned dataset from raw rows: the first row of every question
    /// id supplies both the question and its passage.
    pub fn aligned_from_rows(rows: &[QaRow]) -> Result<Self> {
        let mut seen: HashSet<&str> = HashSet::new();
        let (questions, passages): (Vec<String>, Vec<String>) = rows
            .iter()
            .filter(|row| seen.insert(row.question_id.as_str()))
            .map(|row| (row.question.clone(), row.answer.clone()))
            .unzip();
        Self::aligned(questions, passages)
    }

    /// Reads a JSON array of [`QaRow`] and groups it.
    pub fn from_json_file(path: &Path, positives_only: bool) -> Result<Self> {
        Self::from_rows(&read_rows(path)?, positives_only)
    }

    fn from_parts(corpus: Corpus, queries: Vec<Query>) -> Self {
        let ground_truth = GroundTruth::from_queries(&queries);
        Self { corpus, queries, ground_truth }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn ground_truth(&self) -> &GroundTruth {
        &self.ground_truth
    }

    /// Keeps only documents `0..n` and drops answers pointing past them.
    /// Queries left without answers are removed.
    pub fn truncate_corpus(&self, n: usize) -> Result<Self> {
        let corpus = self.corpus.truncated(n);
        let mut queries = Vec::new();
        for q in &self.queries {
            let kept: Vec<DocId> = q.answers().iter().copied().filter(|&d| d < corpus.len()).collect();
            if !kept.is_empty() {
                queries.push(Query::new(queries.len(), q.text.clone(), kept)?);
            }
        }
        Ok(Self::from_parts(corpus, queries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(qid: &str, question: &str, answer: &str, label: Option<i64>) -> QaRow {
        QaRow { question_id: qid.into(), question: question.into(), answer: answer.into(), label }
    }

    #[test]
    fn duplicate_answers_share_one_document() {
        let rows = vec![
            row("a", "first?", "shared answer", None),
            row("b", "second?", "other", None),
            row("b", "second?", "shared answer", None),
        ];
        let ds = Dataset::from_rows(&rows, false).expect("dataset");
        assert_eq!(ds.corpus().len(), 2);
        assert_eq!(ds.queries().len(), 2);
        let second: Vec<_> = ds.queries()[1].answers().iter().copied().collect();
        assert_eq!(second, vec![0, 1]);
    }

    #[test]
    fn positives_only_can_leave_a_query_empty() {
        let rows = vec![row("a", "q?", "x", Some(0))];
        let err = Dataset::from_rows(&rows, true).unwrap_err();
        assert!(matches!(err, Error::EmptyAnswers(0)));
    }

    #[test]
    fn aligned_rows_keep_the_first_pair_per_question() {
        let rows = vec![
            row("a", "first?", "one", None),
            row("a", "first?", "extra", None),
            row("b", "second?", "two", None),
        ];
        let ds = Dataset::aligned_from_rows(&rows).expect("aligned");
        assert_eq!(ds.corpus().as_slice(), &["one".to_string(), "two".to_string()]);
        assert_eq!(ds.queries()[1].answers().iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn unknown_question_is_not_found() {
        let ds = Dataset::aligned(vec!["q0".into()], vec!["p0".into()]).expect("aligned");
        let err = ds.ground_truth().find_by_question("nope").unwrap_err();
        assert!(matches!(err, Error::QueryNotFound(_)));
    }
}
