use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use qabench_core::error::Result;
use qabench_core::traits::{Encoder, Retriever};
use qabench_core::types::{Corpus, RetrievalResult, ScoredDoc};
use qabench_core::Error;
use qabench_embed::HashingEncoder;
use qabench_hybrid::{RerankParams, RerankRetriever, Reranker};
use qabench_text::{Bm25Params, LexicalIndex};

/// Returns fixed vectors per passage and counts how many passages it encoded.
struct TableEncoder { vectors: HashMap<String, Vec<f32>>, encoded: Mutex<usize> }

impl TableEncoder {
    fn new(pairs: &[(&str, [f32; 2])]) -> Self {
        Self { vectors: pairs.iter().map(|(t, v)| (t.to_string(), v.to_vec())).collect(), encoded: Mutex::new(0) }
    }
}

impl Encoder for TableEncoder {
    fn dim(&self) -> usize { 2 }
    fn encode_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        *self.encoded.lock().unwrap() += texts.len();
        Ok(texts.iter().map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![0.0, 0.0])).collect())
    }
    fn encode_query(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![1.0, 0.0]) }
}

fn fixture() -> (Arc<TableEncoder>, Corpus, RetrievalResult) {
    let encoder = Arc::new(TableEncoder::new(&[("d0", [0.0, 1.0]), ("d1", [1.0, 0.0]), ("d2", [1.0, 1.0]), ("d3", [1.0, 0.0])]));
    let corpus = Corpus::new(vec!["d0".into(), "d1".into(), "d2".into(), "d3".into()]);
    let candidates = RetrievalResult::top_k(
        vec![ScoredDoc { id: 0, score: 2.0 }, ScoredDoc { id: 1, score: 1.5 }, ScoredDoc { id: 2, score: 1.0 }, ScoredDoc { id: 3, score: 0.5 }],
        4,
    );
    (encoder, corpus, candidates)
}

#[test]
fn blends_similarity_with_lexical_score() {
    let (encoder, corpus, candidates) = fixture();
    let reranker = Reranker::new(encoder, RerankParams::default()).unwrap();
    let hits = reranker.rerank(&[1.0, 0.0], &candidates, &corpus, 2).unwrap();
    assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 3]);
    assert!((hits[0].score - (0.7 * 1.0 + 0.3 * 1.5)).abs() < 1e-5);
    assert!((hits[1].score - (0.7 * 1.0 + 0.3 * 0.5)).abs() < 1e-5);
    assert!(hits.iter().all(|h| h.similarity >= 0.7));
    assert_eq!(hits[0].lexical_score, 1.5);
}

#[test]
fn only_the_top_two_k_candidates_are_encoded() {
    let (encoder, corpus, candidates) = fixture();
    let reranker = Reranker::new(encoder.clone(), RerankParams::default()).unwrap();
    let hits = reranker.rerank(&[1.0, 0.0], &candidates, &corpus, 1).unwrap();
    assert_eq!(*encoder.encoded.lock().unwrap(), 2);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1, "document 0 falls under the similarity floor");
}

#[test]
fn fewer_survivors_than_k_are_not_padded() {
    let (encoder, corpus, candidates) = fixture();
    let reranker = Reranker::new(encoder, RerankParams::new(0.7, 0.99).unwrap()).unwrap();
    let hits = reranker.rerank(&[1.0, 0.0], &candidates, &corpus, 3).unwrap();
    assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 3]);

    let none = reranker.rerank(&[1.0, 0.0], &RetrievalResult::default(), &corpus, 3).unwrap();
    assert!(none.is_empty());
}

#[test]
fn non_finite_similarities_are_dropped() {
    let encoder = Arc::new(TableEncoder::new(&[("nan", [f32::NAN, 1.0]), ("ok", [1.0, 0.0])]));
    let corpus = Corpus::new(vec!["nan".into(), "ok".into()]);
    let candidates = RetrievalResult::top_k(vec![ScoredDoc { id: 0, score: 3.0 }, ScoredDoc { id: 1, score: 1.0 }], 2);
    let reranker = Reranker::new(encoder, RerankParams::default()).unwrap();
    let hits = reranker.rerank(&[1.0, 0.0], &candidates, &corpus, 2).unwrap();
    assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1]);
    assert!(hits.iter().all(|h| h.similarity >= 0.7 && h.score.is_finite()));
}

#[test]
fn invalid_parameters_and_inputs_are_rejected() {
    let (encoder, corpus, candidates) = fixture();
    assert!(matches!(RerankParams::new(1.5, 0.7), Err(Error::InvalidConfig(_))));
    let bad = RerankParams { alpha: -0.1, similarity_floor: 0.7 };
    assert!(matches!(Reranker::new(encoder.clone(), bad), Err(Error::InvalidConfig(_))));

    let reranker = Reranker::new(encoder, RerankParams::default()).unwrap();
    assert!(matches!(reranker.rerank(&[1.0, 0.0, 0.0], &candidates, &corpus, 2), Err(Error::DimensionMismatch { .. })));
    assert!(matches!(reranker.rerank(&[1.0, 0.0], &candidates, &corpus, 0), Err(Error::InvalidArgument(_))));
}

#[test]
fn rerank_retriever_over_lexical_index() {
    let docs = vec![
        "Paris is the capital of France.".to_string(),
        "The sky is blue.".to_string(),
        "Water boils at 100C.".to_string(),
    ];
    let lexical = Arc::new(LexicalIndex::build(&docs, Bm25Params::default()).unwrap());
    let encoder: Arc<dyn Encoder> = Arc::new(HashingEncoder::new(1024).unwrap());
    let reranker = Reranker::new(encoder, RerankParams::new(0.7, 0.0).unwrap()).unwrap();
    let retriever = RerankRetriever::new(lexical, reranker, Corpus::new(docs));
    for k in 1..=3 {
        let result = retriever.search("What is the capital of France?", k).unwrap();
        assert!(result.len() <= k);
        assert_eq!(result.first().map(|h| h.id), Some(0));
        for w in result.hits().windows(2) { assert!(w[0].score >= w[1].score); }
    }
}
