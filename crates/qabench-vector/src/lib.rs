//! qabench-vector
//!
//! Exhaustive inner-product search over an in-memory embedding matrix.

pub mod index;
pub mod search;
pub mod writer;

pub use index::{cosine_similarity, dot, VectorIndex, VectorIndexBuilder};
pub use search::DenseRetriever;
