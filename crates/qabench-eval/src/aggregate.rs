use serde::Serialize;
use std::time::Duration;

use qabench_core::types::Strategy;

use crate::harness::{Evaluation, ExactMatchEvaluation};

/// Per-query series of one strategy, in evaluation order, for plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub strategy: Strategy,
    pub label: &'static str,
    pub times_ms: Vec<f64>,
    pub memory_mb: Vec<f64>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub strategy: Strategy,
    pub label: &'static str,
    pub queries: usize,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub max_latency_ms: f64,
    pub peak_memory_mb: f64,
    pub mean_memory_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExactMatchSummary {
    pub strategy: Strategy,
    pub label: &'static str,
    /// Measured queries; skipped ones still count as misses in the ratio.
    pub queries: usize,
    pub exact_match_ratio: f64,
    pub mean_latency_ms: f64,
    pub max_latency_ms: f64,
    pub peak_memory_mb: f64,
}

/// Pure reductions over completed evaluations.
pub struct Aggregator;

impl Aggregator {
    pub fn summarize(evaluation: &Evaluation) -> Vec<StrategySummary> {
        Strategy::ALL
            .iter()
            .map(|&strategy| {
                let i = strategy.index();
                let latencies = millis(&evaluation.times[i]);
                let memory = &evaluation.memory[i];
                StrategySummary {
                    strategy,
                    label: strategy.label(),
                    queries: latencies.len(),
                    mean_precision: mean(&evaluation.precision[i]),
                    mean_recall: mean(&evaluation.recall[i]),
                    mean_latency_ms: mean(&latencies),
                    p50_latency_ms: percentile(&latencies, 50.0),
                    p95_latency_ms: percentile(&latencies, 95.0),
                    max_latency_ms: max(&latencies),
                    peak_memory_mb: max(memory),
                    mean_memory_mb: mean(memory),
                }
            })
            .collect()
    }

    pub fn series(evaluation: &Evaluation) -> Vec<Series> {
        Strategy::ALL
            .iter()
            .map(|&strategy| {
                let i = strategy.index();
                Series {
                    strategy,
                    label: strategy.label(),
                    times_ms: millis(&evaluation.times[i]),
                    memory_mb: evaluation.memory[i].clone(),
                    precision: evaluation.precision[i].clone(),
                    recall: evaluation.recall[i].clone(),
                }
            })
            .collect()
    }

    pub fn summarize_exact_match(evaluation: &ExactMatchEvaluation) -> Vec<ExactMatchSummary> {
        Strategy::ALL
            .iter()
            .map(|&strategy| {
                let i = strategy.index();
                let latencies = millis(&evaluation.times[i]);
                ExactMatchSummary {
                    strategy,
                    label: strategy.label(),
                    queries: evaluation.measured(),
                    exact_match_ratio: evaluation.ratio(strategy),
                    mean_latency_ms: mean(&latencies),
                    max_latency_ms: max(&latencies),
                    peak_memory_mb: max(&evaluation.memory[i]),
                }
            })
            .collect()
    }
}

fn millis(times: &[Duration]) -> Vec<f64> {
    times.iter().map(|d| d.as_secs_f64() * 1e3).collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

/// Nearest-rank percentile; 0 for an empty series.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
