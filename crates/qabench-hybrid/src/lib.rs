use serde::Serialize;
use std::sync::Arc;

use qabench_core::config::RerankConfig;
use qabench_core::error::{ensure_k, Error, Result};
use qabench_core::traits::{Encoder, Retriever};
use qabench_core::types::{rank_order, Corpus, DocId, RetrievalResult, ScoredDoc};
use qabench_text::LexicalIndex;
use qabench_vector::cosine_similarity;

/// Lexical candidates are widened to this multiple of `k` before reranking.
pub const CANDIDATE_FACTOR: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankParams {
    /// Weight of the dense similarity; `1 - alpha` weighs the lexical score.
    pub alpha: f32,
    /// Candidates whose cosine similarity falls below this are dropped.
    pub similarity_floor: f32,
}

impl RerankParams {
    pub fn new(alpha: f32, similarity_floor: f32) -> Result<Self> {
        let params = Self { alpha, similarity_floor };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("rerank alpha must lie in [0, 1], got {}", self.alpha)));
        }
        Ok(())
    }
}

impl Default for RerankParams {
    fn default() -> Self { Self { alpha: 0.7, similarity_floor: 0.7 } }
}

impl From<RerankConfig> for RerankParams {
    fn from(c: RerankConfig) -> Self { Self { alpha: c.alpha, similarity_floor: c.similarity_floor } }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RerankedHit {
    pub id: DocId,
    /// `alpha * similarity + (1 - alpha) * lexical_score`
    pub score: f32,
    pub similarity: f32,
    pub lexical_score: f32,
}

pub struct Reranker { encoder: Arc<dyn Encoder>, params: RerankParams }

impl Reranker {
    pub fn new(encoder: Arc<dyn Encoder>, params: RerankParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { encoder, params })
    }

    pub fn params(&self) -> RerankParams { self.params }

    pub fn encoder(&self) -> &Arc<dyn Encoder> { &self.encoder }

    /// Reorders the best `2k` lexical candidates by blending their dense
    /// similarity to `query_vector` with their lexical score.
    ///
    /// Candidates under the similarity floor are dropped, so fewer than `k`
    /// hits (possibly none) may come back.
    pub fn rerank(&self, query_vector: &[f32], lexical_candidates: &RetrievalResult, corpus: &Corpus, k: usize) -> Result<Vec<RerankedHit>> {
        ensure_k(k)?;
        if query_vector.len() != self.encoder.dim() {
            return Err(Error::DimensionMismatch { expected: self.encoder.dim(), found: query_vector.len() });
        }
        let candidates: Vec<ScoredDoc> = lexical_candidates.hits().iter().take(k * CANDIDATE_FACTOR).copied().collect();
        if candidates.is_empty() { return Ok(Vec::new()); }

        let texts = candidates
            .iter()
            .map(|c| corpus.get(c.id).map(str::to_string).ok_or_else(|| Error::InvalidArgument(format!("candidate {} is outside the corpus", c.id))))
            .collect::<Result<Vec<String>>>()?;
        let vectors = self.encoder.encode_passages(&texts)?;
        if vectors.len() != candidates.len() {
            return Err(Error::Encoder(format!("encoder returned {} vectors for {} candidates", vectors.len(), candidates.len())));
        }

        let RerankParams { alpha, similarity_floor } = self.params;
        let mut hits = Vec::with_capacity(candidates.len());
        for (candidate, vector) in candidates.iter().zip(&vectors) {
            if vector.len() != query_vector.len() {
                return Err(Error::DimensionMismatch { expected: query_vector.len(), found: vector.len() });
            }
            let similarity = cosine_similarity(query_vector, vector);
            // NaN never clears the floor.
            if similarity.is_nan() || similarity < similarity_floor { continue; }
            let score = alpha * similarity + (1.0 - alpha) * candidate.score;
            hits.push(RerankedHit { id: candidate.id, score, similarity, lexical_score: candidate.score });
        }
        hits.sort_by(|a, b| rank_order(&ScoredDoc { id: a.id, score: a.score }, &ScoredDoc { id: b.id, score: b.score }));
        hits.truncate(k);
        tracing::debug!(candidates = candidates.len(), kept = hits.len(), k, "reranked lexical candidates");
        Ok(hits)
    }
}

/// Hybrid strategy: lexical retrieval at `2k`, then dense reranking down to `k`.
pub struct RerankRetriever<L = LexicalIndex> where L: Retriever {
    lexical: Arc<L>,
    reranker: Reranker,
    corpus: Corpus,
}

impl<L> RerankRetriever<L> where L: Retriever {
    pub fn new(lexical: Arc<L>, reranker: Reranker, corpus: Corpus) -> Self { Self { lexical, reranker, corpus } }

    pub fn search_detailed(&self, query: &str, k: usize) -> Result<Vec<RerankedHit>> {
        ensure_k(k)?;
        let query_vector = self.reranker.encoder().encode_query(query)?;
        let candidates = self.lexical.search(query, k * CANDIDATE_FACTOR)?;
        self.reranker.rerank(&query_vector, &candidates, &self.corpus, k)
    }
}

impl<L> Retriever for RerankRetriever<L> where L: Retriever {
    fn search(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let hits = self.search_detailed(query, k)?;
        Ok(RetrievalResult::top_k(hits.into_iter().map(|h| ScoredDoc { id: h.id, score: h.score }).collect(), k))
    }
}
