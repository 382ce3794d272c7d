//! Drives the three retrieval strategies over a query set and records
//! latency, resident memory and retrieval quality per query.
//!
//! Queries run strictly one after another so that timings and memory
//! snapshots are not contaminated by concurrent work.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use qabench_core::config::{EvaluationConfig, MAX_QUERIES};
use qabench_core::dataset::GroundTruth;
use qabench_core::error::{ensure_k, Error, Result};
use qabench_core::traits::Retriever;
use qabench_core::types::{DocId, Query, QueryId, Strategy};

use crate::aggregate::mean;
use crate::memory::MemoryProbe;
use crate::metrics::{exact_match_ratio, precision_at_k, recall_at_k};

/// The three retrieval paths, addressed by [`Strategy`].
#[derive(Clone)]
pub struct RetrieverSet {
    lexical: Arc<dyn Retriever>,
    dense: Arc<dyn Retriever>,
    rerank: Arc<dyn Retriever>,
}

impl RetrieverSet {
    pub fn new(lexical: Arc<dyn Retriever>, dense: Arc<dyn Retriever>, rerank: Arc<dyn Retriever>) -> Self {
        Self { lexical, dense, rerank }
    }

    pub fn get(&self, strategy: Strategy) -> &dyn Retriever {
        match strategy {
            Strategy::Lexical => self.lexical.as_ref(),
            Strategy::Dense => self.dense.as_ref(),
            Strategy::Rerank => self.rerank.as_ref(),
        }
    }
}

/// Which ground-truth convention a run is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Curated multi-document answer sets, scored with precision and recall at k.
    RecallAtK,
    /// Index-aligned corpus: query `i` is answered by document `i`, scored on top-1.
    ExactMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    pub k: usize,
    /// Clamped to [`MAX_QUERIES`] when a run starts.
    pub query_limit: usize,
    pub show_progress: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self { k: 5, query_limit: MAX_QUERIES, show_progress: false }
    }
}

impl From<&EvaluationConfig> for HarnessConfig {
    fn from(c: &EvaluationConfig) -> Self {
        Self { k: c.k, query_limit: c.effective_query_limit(), show_progress: c.show_progress }
    }
}

/// Measurement of one strategy on one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub query_id: QueryId,
    pub strategy: Strategy,
    pub elapsed_ms: f64,
    pub memory_mb: f64,
    pub retrieved: Vec<DocId>,
    pub precision: f64,
    pub recall: f64,
}

/// Output of a recall@k run.
///
/// Every per-strategy array is indexed by [`Strategy::index`] and holds one
/// entry per evaluated query, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub k: usize,
    pub times: [Vec<Duration>; 3],
    pub memory: [Vec<f64>; 3],
    pub recall: [Vec<f64>; 3],
    pub precision: [Vec<f64>; 3],
    pub retrieved_docs: [Vec<Vec<DocId>>; 3],
    pub records: Vec<EvaluationRecord>,
    /// Queries dropped because the encoder failed on one of their strategies.
    pub skipped: Vec<QueryId>,
}

impl Evaluation {
    fn new(k: usize) -> Self {
        Self { k, ..Self::default() }
    }

    /// Number of queries that were evaluated (skipped ones excluded).
    pub fn len(&self) -> usize {
        self.times[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records_for(&self, strategy: Strategy) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.iter().filter(move |r| r.strategy == strategy)
    }

    fn push(&mut self, measurements: Vec<(Duration, EvaluationRecord)>) {
        for (elapsed, record) in measurements {
            let i = record.strategy.index();
            self.times[i].push(elapsed);
            self.memory[i].push(record.memory_mb);
            self.recall[i].push(record.recall);
            self.precision[i].push(record.precision);
            self.retrieved_docs[i].push(record.retrieved.clone());
            self.records.push(record);
        }
    }
}

/// Output of a top-1 run on an index-aligned corpus.
#[derive(Debug, Clone, Default)]
pub struct ExactMatchEvaluation {
    /// Measured queries only; skipped positions have no entry.
    pub times: [Vec<Duration>; 3],
    pub memory: [Vec<f64>; 3],
    /// Top-1 document per evaluated position; `None` when a strategy returned
    /// nothing or the query was skipped.
    pub matches: [Vec<Option<DocId>>; 3],
    pub skipped: Vec<QueryId>,
}

impl ExactMatchEvaluation {
    pub fn len(&self) -> usize {
        self.matches[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ratio(&self, strategy: Strategy) -> f64 {
        exact_match_ratio(&self.matches[strategy.index()])
    }

    /// Queries whose latency and memory were actually measured.
    pub fn measured(&self) -> usize {
        self.times[0].len()
    }
}

pub struct Harness {
    retrievers: RetrieverSet,
    probe: Box<dyn MemoryProbe>,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(retrievers: RetrieverSet, probe: Box<dyn MemoryProbe>, config: HarnessConfig) -> Self {
        Self { retrievers, probe, config }
    }

    pub fn config(&self) -> HarnessConfig {
        self.config
    }

    /// Runs every selected query through lexical, dense and rerank retrieval
    /// at `k` and scores each ranking against the query's answer set.
    ///
    /// With `single_query_index` only that query is evaluated and a mean
    /// precision/recall summary is logged. A query on which the encoder fails
    /// is skipped for all strategies; any other error aborts the run.
    pub fn evaluate(&mut self, ground_truth: &GroundTruth, queries: &[Query], single_query_index: Option<usize>) -> Result<Evaluation> {
        let k = self.config.k;
        ensure_k(k)?;
        let selected = self.select(queries, single_query_index)?;
        tracing::info!(queries = selected.len(), k, single = single_query_index.is_some(), "starting recall@k evaluation");

        let mut evaluation = Evaluation::new(k);
        let pb = self.progress(selected.len());
        for query in selected {
            pb.set_message(format!("query {}", query.id));
            match self.measure(ground_truth, query, k) {
                Ok(measurements) => evaluation.push(measurements),
                Err(e) if e.is_encoder_failure() => {
                    tracing::warn!(query = query.id, error = %e, "encoder failed; skipping query");
                    evaluation.skipped.push(query.id);
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if single_query_index.is_some() {
            log_single_query_summary(&evaluation);
        }
        tracing::info!(evaluated = evaluation.len(), skipped = evaluation.skipped.len(), "evaluation finished");
        Ok(evaluation)
    }

    /// Top-1 evaluation on an index-aligned corpus: query at position `i` is
    /// answered by document `i`. Scored with [`exact_match_ratio`], never
    /// with recall@k.
    pub fn evaluate_exact_match(&mut self, queries: &[Query], corpus_len: usize) -> Result<ExactMatchEvaluation> {
        let selected = self.select(queries, None)?;
        if selected.len() > corpus_len {
            return Err(Error::InvalidArgument(format!(
                "exact-match needs an index-aligned corpus: {} queries but {} documents",
                selected.len(),
                corpus_len
            )));
        }
        tracing::info!(queries = selected.len(), "starting exact-match evaluation");

        let mut evaluation = ExactMatchEvaluation::default();
        let pb = self.progress(selected.len());
        for query in selected {
            match self.top_one(query) {
                Ok(measurements) => {
                    for (strategy, elapsed, memory, top) in measurements {
                        let i = strategy.index();
                        evaluation.times[i].push(elapsed);
                        evaluation.memory[i].push(memory);
                        evaluation.matches[i].push(top);
                    }
                }
                Err(e) if e.is_encoder_failure() => {
                    tracing::warn!(query = query.id, error = %e, "encoder failed; counting query as a miss");
                    evaluation.skipped.push(query.id);
                    for matches in evaluation.matches.iter_mut() {
                        matches.push(None);
                    }
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        for strategy in Strategy::ALL {
            tracing::info!(strategy = %strategy, ratio = evaluation.ratio(strategy), "exact match ratio");
        }
        Ok(evaluation)
    }

    fn select<'q>(&self, queries: &'q [Query], single_query_index: Option<usize>) -> Result<&'q [Query]> {
        match single_query_index {
            Some(i) if i < queries.len() => Ok(&queries[i..=i]),
            Some(i) => Err(Error::QueryNotFound(format!("query index {} (only {} queries)", i, queries.len()))),
            None => {
                let limit = self.config.query_limit.min(MAX_QUERIES);
                Ok(&queries[..queries.len().min(limit)])
            }
        }
    }

    fn measure(&mut self, ground_truth: &GroundTruth, query: &Query, k: usize) -> Result<Vec<(Duration, EvaluationRecord)>> {
        let answers = ground_truth.answers_for(query)?;
        let mut measurements = Vec::with_capacity(Strategy::ALL.len());
        for strategy in Strategy::ALL {
            let start = Instant::now();
            let result = self.retrievers.get(strategy).search(&query.text, k)?;
            let elapsed = start.elapsed();
            let memory_mb = self.probe.resident_mb();
            let retrieved = result.ids();
            let precision = precision_at_k(answers, &retrieved);
            let recall = recall_at_k(answers, &retrieved)?;
            tracing::debug!(query = query.id, %strategy, elapsed_ms = elapsed.as_secs_f64() * 1e3, precision, recall, "measured");
            let record = EvaluationRecord { query_id: query.id, strategy, elapsed_ms: elapsed.as_secs_f64() * 1e3, memory_mb, retrieved, precision, recall };
            measurements.push((elapsed, record));
        }
        Ok(measurements)
    }

    fn top_one(&mut self, query: &Query) -> Result<Vec<(Strategy, Duration, f64, Option<DocId>)>> {
        let mut out = Vec::with_capacity(Strategy::ALL.len());
        for strategy in Strategy::ALL {
            let start = Instant::now();
            let result = self.retrievers.get(strategy).search(&query.text, 1)?;
            let elapsed = start.elapsed();
            let memory_mb = self.probe.resident_mb();
            out.push((strategy, elapsed, memory_mb, result.first().map(|h| h.id)));
        }
        Ok(out)
    }

    fn progress(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} queries {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn log_single_query_summary(evaluation: &Evaluation) {
    for strategy in Strategy::ALL {
        let i = strategy.index();
        tracing::info!(
            strategy = %strategy,
            mean_precision = mean(&evaluation.precision[i]),
            mean_recall = mean(&evaluation.recall[i]),
            "single query summary"
        );
    }
}
