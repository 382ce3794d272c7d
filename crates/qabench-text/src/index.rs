use std::collections::HashMap;

use qabench_core::config::Bm25Config;
use qabench_core::error::{ensure_k, Error, Result};
use qabench_core::traits::Retriever;
use qabench_core::types::{DocId, RetrievalResult, ScoredDoc};

use crate::tantivy_utils::{build_analyzer, tokenize, tokenize_with};

/// Okapi BM25 smoothing constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
	/// Negative IDFs are replaced by `epsilon * mean_idf`.
	pub epsilon: f32,
}

impl Default for Bm25Params {
	fn default() -> Self { Self { k1: 1.5, b: 0.75, epsilon: 0.25 } }
}

impl From<Bm25Config> for Bm25Params {
	fn from(c: Bm25Config) -> Self { Self { k1: c.k1, b: c.b, epsilon: c.epsilon } }
}

/// In-memory BM25Okapi ranking model over a fixed corpus.
///
/// Position `i` in the index is document `i` of the corpus it was built from.
/// The index is immutable once built.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
	params: Bm25Params,
	tokens: Vec<Vec<String>>,
	term_freqs: Vec<HashMap<String, u32>>,
	doc_lens: Vec<usize>,
	avg_doc_len: f32,
	idf: HashMap<String, f32>,
}

impl LexicalIndex {
	pub fn build<S: AsRef<str>>(documents: &[S], params: Bm25Params) -> Result<Self> {
		if documents.is_empty() { return Err(Error::EmptyCorpus); }
		let mut analyzer = build_analyzer();
		let mut all_tokens = Vec::with_capacity(documents.len());
		let mut term_freqs = Vec::with_capacity(documents.len());
		let mut doc_lens = Vec::with_capacity(documents.len());
		let mut doc_freq: HashMap<String, u32> = HashMap::new();
		for doc in documents {
			let tokens = tokenize_with(&mut analyzer, doc.as_ref());
			doc_lens.push(tokens.len());
			let mut tf: HashMap<String, u32> = HashMap::new();
			for t in &tokens { *tf.entry(t.clone()).or_insert(0) += 1; }
			all_tokens.push(tokens);
			for term in tf.keys() { *doc_freq.entry(term.clone()).or_insert(0) += 1; }
			term_freqs.push(tf);
		}
		let total: usize = doc_lens.iter().sum();
		let avg_doc_len = total as f32 / documents.len() as f32;
		let idf = okapi_idf(&doc_freq, documents.len(), params.epsilon);
		tracing::info!(docs = documents.len(), terms = idf.len(), avg_doc_len, "built BM25 index");
		Ok(Self { params, tokens: all_tokens, term_freqs, doc_lens, avg_doc_len, idf })
	}

	pub fn len(&self) -> usize { self.doc_lens.len() }

	pub fn is_empty(&self) -> bool { self.doc_lens.is_empty() }

	pub fn params(&self) -> Bm25Params { self.params }

	/// Tokenized copy of document `id`.
	pub fn tokens(&self, id: DocId) -> Option<&[String]> { self.tokens.get(id).map(Vec::as_slice) }

	pub fn doc_len(&self, id: DocId) -> Option<usize> { self.doc_lens.get(id).copied() }

	pub fn term_frequency(&self, id: DocId, term: &str) -> u32 {
		self.term_freqs.get(id).and_then(|tf| tf.get(term)).copied().unwrap_or(0)
	}

	/// IDF of a term; terms absent from the corpus have IDF 0.
	pub fn idf(&self, term: &str) -> f32 { self.idf.get(term).copied().unwrap_or(0.0) }

	/// BM25 score of every document for `text`, indexed by `DocId`.
	pub fn scores(&self, text: &str) -> Vec<f32> {
		let query_terms = tokenize(text);
		let Bm25Params { k1, b, .. } = self.params;
		let mut scores = vec![0f32; self.len()];
		for term in &query_terms {
			let idf = self.idf(term);
			if idf == 0.0 { continue; }
			for (id, score) in scores.iter_mut().enumerate() {
				let tf = self.term_frequency(id, term) as f32;
				if tf == 0.0 { continue; }
				let len_ratio = if self.avg_doc_len > 0.0 { self.doc_lens[id] as f32 / self.avg_doc_len } else { 1.0 };
				*score += idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * len_ratio));
			}
		}
		scores
	}

	/// Up to `k` documents by descending BM25 score, ties by ascending id.
	/// Zero-score documents only fill the tail when fewer than `k` match.
	pub fn query(&self, text: &str, k: usize) -> Result<RetrievalResult> {
		ensure_k(k)?;
		let hits = self.scores(text).into_iter().enumerate().map(|(id, score)| ScoredDoc { id, score }).collect();
		let result = RetrievalResult::top_k(hits, k);
		tracing::debug!(k, returned = result.len(), "lexical query");
		Ok(result)
	}
}

impl Retriever for LexicalIndex {
	fn search(&self, query: &str, k: usize) -> Result<RetrievalResult> { self.query(query, k) }
}

/// `ln((N - n + 0.5) / (n + 0.5))`, with negative values replaced by
/// `epsilon * mean_idf` (floored at zero so scores never go negative).
fn okapi_idf(doc_freq: &HashMap<String, u32>, num_docs: usize, epsilon: f32) -> HashMap<String, f32> {
	let n_docs = num_docs as f32;
	let mut idf: HashMap<String, f32> = doc_freq
		.iter()
		.map(|(term, &n)| { let n = n as f32; (term.clone(), ((n_docs - n + 0.5) / (n + 0.5)).ln()) })
		.collect();
	if idf.is_empty() { return idf; }
	let mean = idf.values().sum::<f32>() / idf.len() as f32;
	let floor = (epsilon * mean).max(0.0);
	for value in idf.values_mut() { if *value < 0.0 { *value = floor; } }
	idf
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idf_replaces_negative_values() {
		let mut df = HashMap::new();
		df.insert("rare".to_string(), 1);
		df.insert("common".to_string(), 3);
		let idf = okapi_idf(&df, 3, 0.25);
		assert!(idf["rare"] > 0.0);
		assert!(idf["common"] >= 0.0);
	}

	#[test]
	fn scores_follow_the_okapi_formula() {
		let docs = ["alpha beta", "gamma delta epsilon zeta", "eta theta"];
		let index = LexicalIndex::build(&docs, Bm25Params::default()).unwrap();
		let idf = (2.5f32 / 1.5).ln();
		let avg = 8.0f32 / 3.0;
		let expected = idf * 2.5 / (1.0 + 1.5 * (0.25 + 0.75 * 2.0 / avg));
		let scores = index.scores("beta");
		assert!((scores[0] - expected).abs() < 1e-5, "got {} expected {}", scores[0], expected);
		assert_eq!(scores[1], 0.0);
		assert_eq!(scores[2], 0.0);
	}
}
