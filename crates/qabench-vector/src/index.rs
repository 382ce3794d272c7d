use qabench_core::error::{ensure_k, Error, Result};
use qabench_core::types::{DocId, RetrievalResult, ScoredDoc};

/// Flat, row-major matrix of document embeddings searched exhaustively.
///
/// Row `i` is document `i`. Every row and every query share `dim()`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
	dim: usize,
	data: Vec<f32>,
}

impl VectorIndex {
	pub fn build(embeddings: Vec<Vec<f32>>) -> Result<Self> {
		let dim = embeddings.first().map(Vec::len).ok_or(Error::EmptyCorpus)?;
		let mut builder = VectorIndexBuilder::new(dim);
		builder.push_batch(embeddings)?;
		builder.finish()
	}

	pub fn dim(&self) -> usize { self.dim }

	pub fn len(&self) -> usize { self.data.len() / self.dim }

	pub fn is_empty(&self) -> bool { self.data.is_empty() }

	pub fn embedding(&self, id: DocId) -> Option<&[f32]> {
		if id >= self.len() { return None; }
		Some(&self.data[id * self.dim..(id + 1) * self.dim])
	}

	/// Top `k` rows by inner product with `vector`, ties by ascending id.
	pub fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
		ensure_k(k)?;
		if vector.len() != self.dim { return Err(Error::DimensionMismatch { expected: self.dim, found: vector.len() }); }
		let hits = self.data.chunks_exact(self.dim).enumerate().map(|(id, row)| ScoredDoc { id, score: dot(row, vector) }).collect();
		Ok(RetrievalResult::top_k(hits, k))
	}
}

/// Accumulates embedding batches in insertion order.
#[derive(Debug)]
pub struct VectorIndexBuilder {
	dim: usize,
	data: Vec<f32>,
}

impl VectorIndexBuilder {
	pub fn new(dim: usize) -> Self { Self { dim, data: Vec::new() } }

	pub fn with_capacity(dim: usize, rows: usize) -> Self { Self { dim, data: Vec::with_capacity(dim * rows) } }

	pub fn len(&self) -> usize { if self.dim == 0 { 0 } else { self.data.len() / self.dim } }

	pub fn is_empty(&self) -> bool { self.data.is_empty() }

	/// Appends rows after those already pushed. A batch with a row of the
	/// wrong width is rejected whole.
	pub fn push_batch(&mut self, batch: Vec<Vec<f32>>) -> Result<()> {
		if let Some(bad) = batch.iter().find(|row| row.len() != self.dim) {
			return Err(Error::DimensionMismatch { expected: self.dim, found: bad.len() });
		}
		for row in batch { self.data.extend_from_slice(&row); }
		Ok(())
	}

	pub fn finish(self) -> Result<VectorIndex> {
		if self.dim == 0 { return Err(Error::InvalidArgument("embedding dimension must be greater than zero".to_string())); }
		if self.data.is_empty() { return Err(Error::EmptyCorpus); }
		Ok(VectorIndex { dim: self.dim, data: self.data })
	}
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// Cosine similarity; 0 when either side has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	let norm_a = dot(a, a).sqrt();
	let norm_b = dot(b, b).sqrt();
	if norm_a == 0.0 || norm_b == 0.0 { return 0.0; }
	dot(a, b) / (norm_a * norm_b)
}
