//! JSON report handed to the external plotting step.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use qabench_core::error::Result;
use qabench_core::types::{Corpus, DocId, QueryId};

use crate::aggregate::{Aggregator, ExactMatchSummary, Series, StrategySummary};
use crate::harness::{Evaluation, EvaluationMode, EvaluationRecord, ExactMatchEvaluation};

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub mode: EvaluationMode,
    pub k: usize,
    pub corpus_size: usize,
    /// blake3 over the corpus documents, in order.
    pub corpus_fingerprint: String,
    pub evaluated_queries: usize,
    pub skipped_queries: Vec<QueryId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReportBody {
    RecallAtK { summaries: Vec<StrategySummary>, series: Vec<Series>, records: Vec<EvaluationRecord> },
    ExactMatch { summaries: Vec<ExactMatchSummary>, matches: [Vec<Option<DocId>>; 3] },
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: RunMetadata,
    pub results: ReportBody,
}

impl Report {
    pub fn recall_at_k(corpus: &Corpus, evaluation: &Evaluation) -> Self {
        let metadata = RunMetadata {
            generated_at: Utc::now(),
            mode: EvaluationMode::RecallAtK,
            k: evaluation.k,
            corpus_size: corpus.len(),
            corpus_fingerprint: corpus_fingerprint(corpus),
            evaluated_queries: evaluation.len(),
            skipped_queries: evaluation.skipped.clone(),
        };
        let results = ReportBody::RecallAtK {
            summaries: Aggregator::summarize(evaluation),
            series: Aggregator::series(evaluation),
            records: evaluation.records.clone(),
        };
        Self { metadata, results }
    }

    pub fn exact_match(corpus: &Corpus, evaluation: &ExactMatchEvaluation) -> Self {
        let metadata = RunMetadata {
            generated_at: Utc::now(),
            mode: EvaluationMode::ExactMatch,
            k: 1,
            corpus_size: corpus.len(),
            corpus_fingerprint: corpus_fingerprint(corpus),
            evaluated_queries: evaluation.measured(),
            skipped_queries: evaluation.skipped.clone(),
        };
        let results = ReportBody::ExactMatch { summaries: Aggregator::summarize_exact_match(evaluation), matches: evaluation.matches.clone() };
        Self { metadata, results }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the pretty-printed report, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "wrote report");
        Ok(())
    }
}

/// Length-prefixed blake3 digest of every document, so reports from
/// different corpora are never confused.
pub fn corpus_fingerprint(corpus: &Corpus) -> String {
    let mut hasher = blake3::Hasher::new();
    for doc in corpus.iter() {
        hasher.update(&(doc.len() as u64).to_le_bytes());
        hasher.update(doc.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
