use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use qabench_core::error::{Error, Result};
use qabench_core::traits::Encoder;

use crate::pool::l2_normalize;
use crate::tokenize::words;

/// Deterministic feature-hashing encoder.
///
/// Every word is hashed into one of `dim` buckets and the bucket vector is
/// L2-normalized, so texts sharing words have a positive cosine similarity and
/// texts sharing none have similarity 0. Passages and queries share one space.
#[derive(Debug, Clone)]
pub struct HashingEncoder { dim: usize, seed: u64 }

impl HashingEncoder {
    pub fn new(dim: usize) -> Result<Self> { Self::with_seed(dim, 0) }

    pub fn with_seed(dim: usize, seed: u64) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig("encoder dimension must be greater than zero".to_string())); }
        Ok(Self { dim, seed })
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in words(text).enumerate() {
            let mut hasher = XxHash64::with_seed(self.seed); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i % 3) as f32 * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Encoder for HashingEncoder {
    fn dim(&self) -> usize { self.dim }

    fn encode_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed(t)).collect()) }

    fn encode_query(&self, text: &str) -> Result<Vec<f32>> { Ok(self.embed(text)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

    #[test]
    fn shapes_norm_and_determinism() {
        let enc = HashingEncoder::new(64).unwrap();
        let embs = enc.encode_passages(&["hello world".to_string(), "hello world".to_string()]).unwrap();
        assert_eq!(embs[0].len(), 64);
        let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-4, "norm={norm}");
        assert_eq!(embs[0], embs[1]);
        assert_eq!(enc.encode_query("hello world").unwrap(), embs[0]);
    }

    #[test]
    fn shared_words_raise_similarity() {
        let enc = HashingEncoder::new(4096).unwrap();
        let q = enc.encode_query("capital of France").unwrap();
        let near = enc.encode_query("Paris is the capital of France.").unwrap();
        let far = enc.encode_query("Water boils at 100C.").unwrap();
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let enc = HashingEncoder::new(8).unwrap();
        assert!(enc.encode_query("  ?! ").unwrap().iter().all(|x| *x == 0.0));
        assert!(matches!(HashingEncoder::new(0), Err(Error::InvalidConfig(_))));
    }
}
