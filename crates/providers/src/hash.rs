use crate::{EmbedIntent, EmbeddingProvider, ProviderError};

/// Deterministic offline embedder: hashed bag-of-words, L2-normalized.
///
/// Identical text always yields a bit-identical vector, so tests and keyless
/// local runs get stable rankings. Token overlap translates directly into
/// cosine similarity; it is no substitute for a real semantic model.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str, _intent: EmbedIntent) -> Result<Vec<f32>, ProviderError> {
        Ok(self.vectorize(text))
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_yields_identical_vectors() {
        let provider = HashEmbeddingProvider::new(128);
        let a = provider.vectorize("Rust systems programming");
        let b = provider.vectorize("Rust systems programming");
        assert_eq!(a, b);
    }

    #[test]
    fn vectors_are_unit_length() {
        let provider = HashEmbeddingProvider::new(128);
        let v = provider.vectorize("excel data entry");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_yields_zero_vector() {
        let provider = HashEmbeddingProvider::new(64);
        let v = provider.vectorize("   ");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(v.len(), 64);
    }

    #[test]
    fn token_overlap_raises_similarity() {
        let provider = HashEmbeddingProvider::new(256);
        let a = provider.vectorize("excel data entry clerk");
        let b = provider.vectorize("data entry specialist excel");
        let c = provider.vectorize("house cleaner");
        let dot = |x: &[f32], y: &[f32]| x.iter().zip(y).map(|(p, q)| p * q).sum::<f32>();
        assert!(dot(&a, &b) > dot(&a, &c));
    }
}
