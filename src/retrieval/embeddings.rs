//! Hash-based text embeddings for the local vector index.
//!
//! Words and character trigrams are hashed into fixed buckets and the vector is
//! L2-normalised. Good enough to rank homework chunks against a concept name
//! without calling an embedding service.

use ndarray::Array1;
use sha2::{Digest, Sha256};

/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = 256;

/// Generator for hashed text embeddings.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimension: usize,
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashedEmbedder {
    /// Creates an embedder. Dimensions below 4 are raised to 4.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(4),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds `text`. The first half of the vector holds word buckets, the
    /// second half character-trigram buckets.
    pub fn embed(&self, text: &str) -> Array1<f64> {
        let mut embedding = Array1::zeros(self.dimension);
        let lower = text.to_lowercase();

        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return embedding;
        }

        let word_dim = self.dimension / 2;
        for word in &words {
            embedding[hash_to_index(word, word_dim)] += 1.0;
        }

        let trigram_dim = self.dimension - word_dim;
        for word in &words {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[word_dim + hash_to_index(&trigram, trigram_dim)] += 0.5;
            }
        }

        let norm = embedding.dot(&embedding).sqrt();
        if norm > 0.0 {
            embedding /= norm;
        }
        embedding
    }
}

fn hash_to_index(input: &str, max_index: usize) -> usize {
    if max_index == 0 {
        return 0;
    }
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(bytes) % max_index as u64) as usize
}

/// Cosine similarity in [-1, 1]; 0 when either vector is zero.
pub fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(b) / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_normalised() {
        let embedder = HashedEmbedder::new(64);
        let v = embedder.embed("binary search halves the interval");
        assert_eq!(v.len(), 64);
        assert!((v.dot(&v).sqrt() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashedEmbedder::default();
        let v = embedder.embed("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &embedder.embed("recursion")), 0.0);
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = HashedEmbedder::default();
        let query = embedder.embed("recursion");
        let related = embedder.embed("a recursive function needs a base case; recursion depth");
        let unrelated = embedder.embed("dijkstra relaxes edges of a weighted graph");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_identical_text_similarity_is_one() {
        let embedder = HashedEmbedder::default();
        let a = embedder.embed("dynamic programming memoization");
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }
}
