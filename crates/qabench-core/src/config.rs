//! Layered benchmark configuration and path helpers.
//!
//! Uses Figment to merge defaults + `qabench.toml` + `qabench.<env>.toml` +
//! `QABENCH_*` env vars (`__` separates nested keys, e.g.
//! `QABENCH_EVALUATION__K=10`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Hard ceiling on the number of queries of any full evaluation run.
pub const MAX_QUERIES: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub evaluation: EvaluationConfig,
    pub bm25: Bm25Config,
    pub rerank: RerankConfig,
    pub encoder: EncoderConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Number of queries of a full run; clamped to [`MAX_QUERIES`].
    pub query_limit: usize,
    pub k: usize,
    /// Evaluate only this query (diagnostic mode).
    pub single_query: Option<usize>,
    /// Only rows labelled `1` count as answers when grouping the dataset.
    pub positives_only: bool,
    /// Optional cap on the corpus size (the original runs used 100).
    pub corpus_limit: Option<usize>,
    pub show_progress: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { query_limit: MAX_QUERIES, k: 5, single_query: None, positives_only: false, corpus_limit: None, show_progress: true }
    }
}

impl EvaluationConfig {
    pub fn effective_query_limit(&self) -> usize {
        self.query_limit.min(MAX_QUERIES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
    pub epsilon: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75, epsilon: 0.25 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub alpha: f32,
    pub similarity_floor: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self { alpha: 0.7, similarity_floor: 0.7 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    Hashing,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub kind: EncoderKind,
    pub dim: usize,
    /// Passages encoded per call while building the dense index.
    pub batch_size: usize,
    pub endpoint: String,
    pub passage_model: String,
    /// Falls back to `passage_model` when unset.
    pub query_model: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderKind::Hashing,
            dim: 768,
            batch_size: 10_000,
            endpoint: "http://localhost:8080/v1/embeddings".to_string(),
            passage_model: "facebook/dpr-ctx_encoder-single-nq-base".to_string(),
            query_model: Some("facebook/dpr-question_encoder-single-nq-base".to_string()),
            api_key_env: "QABENCH_ENCODER_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub report_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: "results".to_string(), report_name: "evaluation".to_string() }
    }
}

impl BenchConfig {
    /// Loads `qabench.toml` + `qabench.<env>.toml` from the working directory,
    /// then `QABENCH_*` environment variables. `RUST_ENV` selects the env.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Self::figment_from_files(dir, env_name);
        figment = figment.merge(Env::prefixed("QABENCH_").split("__"));
        Self::extract(&figment)
    }

    /// Defaults and TOML layers only, without environment overrides.
    pub fn figment_from_files(dir: &Path, env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(BenchConfig::default())).merge(Toml::file(dir.join("qabench.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("qabench.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("qabench.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("qabench.test.toml"))),
            _ => {}
        }
        figment
    }

    pub fn extract(figment: &Figment) -> anyhow::Result<Self> {
        let config: BenchConfig = figment.extract().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.evaluation.k == 0 {
            anyhow::bail!("evaluation.k must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.rerank.alpha) {
            anyhow::bail!("rerank.alpha must lie in [0, 1], got {}", self.rerank.alpha);
        }
        if self.encoder.dim == 0 || self.encoder.batch_size == 0 {
            anyhow::bail!("encoder.dim and encoder.batch_size must be greater than zero");
        }
        if self.bm25.k1 < 0.0 || !(0.0..=1.0).contains(&self.bm25.b) {
            anyhow::bail!("bm25.k1 must be >= 0 and bm25.b in [0, 1]");
        }
        if self.evaluation.query_limit > MAX_QUERIES {
            tracing::warn!(requested = self.evaluation.query_limit, cap = MAX_QUERIES, "query limit above the fixed ceiling; clamping");
        }
        Ok(())
    }

    /// Report file under `output.dir`; a relative dir is taken from `base`.
    pub fn report_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.output.dir).join(format!("{}.json", self.output.report_name))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
