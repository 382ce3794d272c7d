use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use qabench_core::config::BenchConfig;
use qabench_core::dataset::{read_rows, Dataset};
use qabench_core::types::{Corpus, Strategy};
use qabench_embed::get_default_encoder;
use qabench_eval::{corpus_fingerprint, Aggregator, Harness, HarnessConfig, ProcessMemory, Report, RetrieverSet};
use qabench_hybrid::{RerankParams, RerankRetriever, Reranker};
use qabench_text::{Bm25Params, LexicalIndex};
use qabench_vector::{DenseRetriever, VectorIndex};

#[derive(Parser)]
#[command(name = "qabench")]
#[command(about = "Benchmark BM25, dense and reranked retrieval on a question/answer corpus")]
#[command(version)]
struct Cli {
    /// Directory holding qabench.toml and qabench.<env>.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Config environment (falls back to RUST_ENV, then "dev")
    #[arg(long)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DataArgs {
    /// JSON array of {question_id, question, answer, label} rows
    #[arg(short, long)]
    data: PathBuf,

    /// Keep only the first N documents
    #[arg(long)]
    corpus_limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Precision/recall@k of every strategy over the query set
    Run {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        k: Option<usize>,
        /// Number of queries (never more than 30)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Evaluate only the query at this position
        #[arg(long)]
        single: Option<usize>,
        /// Only rows labelled 1 count as answers
        #[arg(long)]
        positives_only: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Top-1 exact-match ratio on an index-aligned corpus
    ExactMatch {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one ad-hoc question through all three strategies
    Query {
        #[command(flatten)]
        data: DataArgs,
        text: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print dataset statistics without building any index
    Validate {
        #[command(flatten)]
        data: DataArgs,
    },
}

struct Engines {
    lexical: Arc<LexicalIndex>,
    dense: Arc<DenseRetriever>,
    rerank: Arc<RerankRetriever>,
}

impl Engines {
    fn build(corpus: &Corpus, config: &BenchConfig) -> Result<Self> {
        let encoder = get_default_encoder(&config.encoder).context("creating encoder")?;

        let start = Instant::now();
        let lexical = Arc::new(LexicalIndex::build(corpus.as_slice(), Bm25Params::from(config.bm25))?);
        println!("📚 BM25 index: {} documents in {:.2?}", lexical.len(), start.elapsed());

        let start = Instant::now();
        let vectors = VectorIndex::encode_corpus_with(encoder.as_ref(), corpus, config.encoder.batch_size, config.evaluation.show_progress)
            .context("encoding corpus")?;
        println!("🧮 Dense index: {} x {} in {:.2?}", vectors.len(), vectors.dim(), start.elapsed());

        let dense = Arc::new(DenseRetriever::new(Arc::new(vectors), encoder.clone()));
        let reranker = Reranker::new(encoder, RerankParams::from(config.rerank))?;
        let rerank = Arc::new(RerankRetriever::new(lexical.clone(), reranker, corpus.clone()));
        Ok(Self { lexical, dense, rerank })
    }

    fn retrievers(&self) -> RetrieverSet {
        RetrieverSet::new(self.lexical.clone(), self.dense.clone(), self.rerank.clone())
    }
}

fn load_config(cli: &Cli) -> Result<BenchConfig> {
    let env_name = cli.env.clone().unwrap_or_else(|| std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()));
    BenchConfig::load_from(&cli.config_dir, &env_name).map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })
}

fn limit_corpus(dataset: Dataset, limit: Option<usize>) -> Result<Dataset> {
    match limit {
        Some(n) => Ok(dataset.truncate_corpus(n)?),
        None => Ok(dataset),
    }
}

fn output_path(config: &BenchConfig, config_dir: &Path, output: Option<PathBuf>, suffix: &str) -> PathBuf {
    output.unwrap_or_else(|| {
        let default = config.report_path(config_dir);
        if suffix.is_empty() {
            return default;
        }
        let stem = format!("{}_{}.json", config.output.report_name, suffix);
        default.with_file_name(stem)
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Run { data, k, limit, single, positives_only, output } => {
            if let Some(k) = k { config.evaluation.k = k; }
            if let Some(limit) = limit { config.evaluation.query_limit = limit; }
            if single.is_some() { config.evaluation.single_query = single; }
            config.evaluation.positives_only |= positives_only;
            let corpus_limit = data.corpus_limit.or(config.evaluation.corpus_limit);
            config.validate()?;

            let dataset = Dataset::from_json_file(&data.data, config.evaluation.positives_only)
                .with_context(|| format!("loading {}", data.data.display()))?;
            let dataset = limit_corpus(dataset, corpus_limit)?;
            println!("📦 {} documents, {} queries", dataset.corpus().len(), dataset.queries().len());

            let engines = Engines::build(dataset.corpus(), &config)?;
            let mut harness = Harness::new(engines.retrievers(), Box::new(ProcessMemory::new()), HarnessConfig::from(&config.evaluation));
            let evaluation = harness.evaluate(dataset.ground_truth(), dataset.queries(), config.evaluation.single_query)?;

            println!("\n📊 Recall@{} over {} queries ({} skipped)", config.evaluation.k, evaluation.len(), evaluation.skipped.len());
            println!("{:<10} {:>9} {:>9} {:>10} {:>10} {:>10} {:>10}", "strategy", "precision", "recall", "mean ms", "p95 ms", "max ms", "peak MB");
            for s in Aggregator::summarize(&evaluation) {
                println!(
                    "{:<10} {:>9.3} {:>9.3} {:>10.3} {:>10.3} {:>10.3} {:>10.1}",
                    s.label, s.mean_precision, s.mean_recall, s.mean_latency_ms, s.p95_latency_ms, s.max_latency_ms, s.peak_memory_mb
                );
            }

            let path = output_path(&config, &cli.config_dir, output, "");
            Report::recall_at_k(dataset.corpus(), &evaluation).write_json(&path)?;
            println!("✅ Report written to {}", path.display());
        }
        Commands::ExactMatch { data, limit, output } => {
            if let Some(limit) = limit { config.evaluation.query_limit = limit; }
            let corpus_limit = data.corpus_limit.or(config.evaluation.corpus_limit);
            config.validate()?;

            let rows = read_rows(&data.data).with_context(|| format!("loading {}", data.data.display()))?;
            let dataset = limit_corpus(Dataset::aligned_from_rows(&rows)?, corpus_limit)?;
            println!("📦 {} aligned question/passage pairs", dataset.corpus().len());

            let engines = Engines::build(dataset.corpus(), &config)?;
            let mut harness = Harness::new(engines.retrievers(), Box::new(ProcessMemory::new()), HarnessConfig::from(&config.evaluation));
            let evaluation = harness.evaluate_exact_match(dataset.queries(), dataset.corpus().len())?;

            for strategy in Strategy::ALL {
                println!("Exact Match Ratio for {}: {:.3}", strategy, evaluation.ratio(strategy));
            }

            let path = output_path(&config, &cli.config_dir, output, "exact_match");
            Report::exact_match(dataset.corpus(), &evaluation).write_json(&path)?;
            println!("✅ Report written to {}", path.display());
        }
        Commands::Query { data, text, k } => {
            let k = k.unwrap_or(config.evaluation.k);
            let dataset = Dataset::from_json_file(&data.data, config.evaluation.positives_only)?;
            let dataset = limit_corpus(dataset, data.corpus_limit.or(config.evaluation.corpus_limit))?;
            let corpus = dataset.corpus();
            let engines = Engines::build(corpus, &config)?;
            let retrievers = engines.retrievers();

            println!("\n🔎 {}", text);
            for strategy in Strategy::ALL {
                let start = Instant::now();
                let result = retrievers.get(strategy).search(&text, k)?;
                println!("\n{} ({} hits, {:.2?})", strategy, result.len(), start.elapsed());
                for (rank, hit) in result.hits().iter().enumerate() {
                    let doc = corpus.get(hit.id).unwrap_or_default();
                    let snippet: String = doc.chars().take(100).collect();
                    println!("{:>2}. [{:>4}] {:.4}  {}", rank + 1, hit.id, hit.score, snippet);
                }
            }
            if let Ok((id, entry)) = dataset.ground_truth().find_by_question(&text) {
                println!("\n🎯 Known question {}: answers {:?}", id, entry.answers);
            }
        }
        Commands::Validate { data } => {
            let dataset = Dataset::from_json_file(&data.data, config.evaluation.positives_only)?;
            let dataset = limit_corpus(dataset, data.corpus_limit.or(config.evaluation.corpus_limit))?;
            print_stats(&data.data, &dataset, &config);
        }
    }
    Ok(())
}

fn print_stats(path: &Path, dataset: &Dataset, config: &BenchConfig) {
    let corpus = dataset.corpus();
    let queries = dataset.queries();
    let answer_counts: Vec<usize> = queries.iter().map(|q| q.answers().len()).collect();
    let total_answers: usize = answer_counts.iter().sum();
    let empty_docs = corpus.iter().filter(|d| d.trim().is_empty()).count();
    let avg_doc_chars = if corpus.is_empty() { 0.0 } else { corpus.iter().map(|d| d.chars().count()).sum::<usize>() as f64 / corpus.len() as f64 };

    println!("📄 {}", path.display());
    println!("   documents:        {}", corpus.len());
    println!("   empty documents:  {}", empty_docs);
    println!("   avg doc chars:    {:.1}", avg_doc_chars);
    println!("   queries:          {}", queries.len());
    if !queries.is_empty() {
        println!("   answers/query:    {:.2} (max {})", total_answers as f64 / queries.len() as f64, answer_counts.iter().max().copied().unwrap_or(0));
    }
    println!("   evaluated per run: {}", queries.len().min(config.evaluation.effective_query_limit()));
    println!("   fingerprint:      {}", corpus_fingerprint(corpus));
}
