//! Embedding capability used by the `semantic-embedding` strategy

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::text;
use crate::error::EmulatorResult;

/// Turns text into a dense vector
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> EmulatorResult<Vec<f32>>;
}

/// Deterministic embedder hashing character n-grams into a fixed-size vector.
///
/// Always available; a model-backed embedder can replace it per deployment.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn embed_sync(&self, input: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for gram in text::char_ngrams(&text::norm(input)) {
            let h = fnv1a(gram.as_bytes());
            let slot = (h % self.dim as u64) as usize;
            // sign bit spreads collisions around zero
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, text: &str) -> EmulatorResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes.iter().fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// An embedder paired with the case-pattern vectors.
///
/// Pattern vectors are computed once on first use. Query vectors are never kept.
pub struct EmbeddingIndex {
    inner: Arc<dyn Embedder>,
    patterns: Vec<String>,
    vectors: OnceCell<Vec<Option<Vec<f32>>>>,
}

impl EmbeddingIndex {
    pub fn new(inner: Arc<dyn Embedder>, patterns: Vec<String>) -> Self {
        Self {
            inner,
            patterns,
            vectors: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn embed_query(&self, text: &str) -> EmulatorResult<Vec<f32>> {
        self.inner.embed(text).await
    }

    /// One slot per pattern; `None` where embedding the pattern failed
    pub async fn pattern_vectors(&self) -> &[Option<Vec<f32>>] {
        self.vectors
            .get_or_init(|| async {
                let mut out = Vec::with_capacity(self.patterns.len());
                for pattern in &self.patterns {
                    match self.inner.embed(pattern).await {
                        Ok(v) => out.push(Some(v)),
                        Err(e) => {
                            tracing::warn!(error = %e, pattern = %pattern, "pattern embedding failed");
                            out.push(None);
                        }
                    }
                }
                out
            })
            .await
    }

    /// Number of vectors held
    pub fn stored(&self) -> usize {
        self.vectors.get().map_or(0, |v| v.iter().flatten().count())
    }
}

/// Cosine similarity over the common prefix of two vectors
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let na = if na == 0.0 { 1.0 } else { na };
    let nb = if nb == 0.0 { 1.0 } else { nb };
    dot / (na.sqrt() * nb.sqrt())
}

/// Pattern text fed to the embedder: placeholders become a generic token
pub fn placeholderize(pattern: &str) -> String {
    text::norm(&super::template::replace_placeholders(pattern, " var "))
}
