use crate::error::Result;
use crate::types::RetrievalResult;

/// Dual encoder collaborator: passages and queries map into one vector space.
///
/// Implementations must be deterministic and return vectors of width `dim()`.
pub trait Encoder: Send + Sync {
    fn dim(&self) -> usize;
    fn encode_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn encode_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Common capability of the three retrieval strategies.
pub trait Retriever: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<RetrievalResult>;
}
