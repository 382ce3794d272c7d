use std::sync::Arc;

use qabench_core::error::Result;
use qabench_core::traits::{Encoder, Retriever};
use qabench_core::types::RetrievalResult;

use crate::index::VectorIndex;

/// Dense retrieval: encode the question, then search the flat index.
pub struct DenseRetriever { index: Arc<VectorIndex>, encoder: Arc<dyn Encoder> }

impl DenseRetriever {
	pub fn new(index: Arc<VectorIndex>, encoder: Arc<dyn Encoder>) -> Self { Self { index, encoder } }

	pub fn index(&self) -> &VectorIndex { &self.index }
}

impl Retriever for DenseRetriever {
	fn search(&self, query: &str, k: usize) -> Result<RetrievalResult> {
		let vector = self.encoder.encode_query(query)?;
		let result = self.index.query(&vector, k)?;
		tracing::debug!(k, returned = result.len(), "dense query");
		Ok(result)
	}
}
