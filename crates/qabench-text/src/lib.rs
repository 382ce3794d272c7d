//! qabench-text
//!
//! Lexical retrieval: an in-memory BM25Okapi index whose tokenizer is a
//! tantivy text analyzer (lowercase, split on non-alphanumerics).

pub mod tantivy_utils;
pub mod index;

pub use index::{Bm25Params, LexicalIndex};
pub use tantivy_utils::tokenize;
