use crate::error::{EmbeddingIndexError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Produces fixed-dimension vectors for text.
///
/// The trait is the seam between the index and whatever model backs it;
/// stores record the implementation's `model_tag` so a swapped model is
/// detected on load instead of silently mixing vector spaces.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, in order
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Vector dimension, constant for the embedder's lifetime
    fn dimension(&self) -> usize;

    /// Identifies the model and vector space ("hash-384-v1")
    fn model_tag(&self) -> &str;
}

/// Deterministic feature-hashing embedder.
///
/// Tokenizes to lowercase identifier-ish tokens and hashes each into a
/// signed bucket, then L2-normalizes. No model download, no randomness:
/// the same text always yields the same vector, which is what the sync
/// tests and offline installs rely on.
pub struct HashEmbedder {
    dimension: usize,
    tag: String,
}

pub const DEFAULT_DIMENSION: usize = 384;

impl HashEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            tag: format!("hash-{dimension}-v1"),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let raw = u64::from_le_bytes(digest[..8].try_into().unwrap_or([0u8; 8]));
            let bucket = (raw % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_tag(&self) -> &str {
        &self.tag
    }
}

/// Lowercased runs of alphanumerics and underscores
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity between two vectors of the same dimension
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingIndexError::InvalidDimension {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("def fetch_user(id): ...").await.unwrap();
        let b = embedder.embed("def fetch_user(id): ...").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn different_texts_differ() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("parse json config").await.unwrap();
        let b = embedder.embed("render html template").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("open a database connection").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_texts_score_higher() {
        let embedder = HashEmbedder::new();
        let query = embedder.embed("read user from database").await.unwrap();
        let close = embedder
            .embed("def read_user(database): return database.get(user)")
            .await
            .unwrap();
        let far = embedder
            .embed("const color = computeGradient(pixels)")
            .await
            .unwrap();

        let close_score = cosine_similarity(&query, &close).unwrap();
        let far_score = cosine_similarity(&query, &far).unwrap();
        assert!(close_score > far_score);
    }

    #[test]
    fn cosine_rejects_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingIndexError::InvalidDimension { .. }
        ));
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
    }

    #[tokio::test]
    async fn batch_matches_single() {
        let embedder = HashEmbedder::new();
        let batch = embedder.embed_batch(&["alpha", "beta"]).await.unwrap();
        let single = embedder.embed("beta").await.unwrap();
        assert_eq!(batch[1], single);
    }
}
