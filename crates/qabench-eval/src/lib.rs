//! qabench-eval
//!
//! Evaluation harness, metrics and reporting for the three retrieval strategies.

pub mod aggregate;
pub mod harness;
pub mod memory;
pub mod metrics;
pub mod report;

pub use aggregate::{Aggregator, ExactMatchSummary, Series, StrategySummary};
pub use harness::{EvaluationMode, Evaluation, EvaluationRecord, ExactMatchEvaluation, Harness, HarnessConfig, RetrieverSet};
pub use memory::{MemoryProbe, ProcessMemory};
pub use metrics::{exact_match_ratio, precision_at_k, recall_at_k};
pub use report::{corpus_fingerprint, Report};
