use indicatif::{ProgressBar, ProgressStyle};

use qabench_core::error::{Error, Result};
use qabench_core::traits::Encoder;
use qabench_core::types::Corpus;

use crate::index::{VectorIndex, VectorIndexBuilder};

impl VectorIndex {
	/// Encodes `corpus` through `encoder` in batches of `batch_size` passages.
	/// At most one batch of encoder output is held besides the index itself.
	pub fn encode_corpus(encoder: &dyn Encoder, corpus: &Corpus, batch_size: usize) -> Result<Self> {
		Self::encode_corpus_with(encoder, corpus, batch_size, true)
	}

	pub fn encode_corpus_with(encoder: &dyn Encoder, corpus: &Corpus, batch_size: usize, show_progress: bool) -> Result<Self> {
		if corpus.is_empty() { return Err(Error::EmptyCorpus); }
		if batch_size == 0 { return Err(Error::InvalidArgument("batch_size must be greater than zero".to_string())); }
		tracing::info!(docs = corpus.len(), batch_size, dim = encoder.dim(), "encoding corpus");
		let pb = if show_progress { ProgressBar::new(corpus.len() as u64) } else { ProgressBar::hidden() };
		if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%) {msg}") {
			pb.set_style(style.progress_chars("#>-"));
		}
		let mut builder = VectorIndexBuilder::with_capacity(encoder.dim(), corpus.len());
		for (i, batch) in corpus.as_slice().chunks(batch_size).enumerate() {
			let vectors = encoder.encode_passages(batch)?;
			if vectors.len() != batch.len() {
				return Err(Error::Encoder(format!("encoder returned {} vectors for {} passages", vectors.len(), batch.len())));
			}
			builder.push_batch(vectors)?;
			pb.inc(batch.len() as u64); pb.set_message(format!("batch {}", i + 1));
			tracing::debug!(batch = i + 1, encoded = builder.len(), "encoded passage batch");
		}
		pb.finish_with_message("done");
		builder.finish()
	}
}
