//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// How an embedding model expects queries and passages to be presented.
///
/// Symmetric models encode queries and documents identically. Asymmetric
/// (instruction-tuned) retrieval models such as the E5 family require a
/// textual prefix distinguishing the two sides; mixing conventions within
/// one index degrades retrieval quality, so the orchestrator tags text via
/// the provider's declared convention before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingConvention {
    /// Queries and passages are encoded identically.
    Symmetric,
    /// Queries carry a `"query: "` prefix, passages a `"passage: "` prefix.
    Asymmetric,
}

impl EncodingConvention {
    /// Tag a search query for encoding.
    pub fn tag_query(&self, text: &str) -> String {
        match self {
            Self::Symmetric => text.to_string(),
            Self::Asymmetric => format!("query: {text}"),
        }
    }

    /// Tag a document passage for encoding.
    pub fn tag_passage(&self, text: &str) -> String {
        match self {
            Self::Symmetric => text.to_string(),
            Self::Asymmetric => format!("passage: {text}"),
        }
    }
}

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific backend behind a unified async
/// interface. Every returned vector is L2-normalized (unit length) so that
/// cosine similarity reduces to a dot product — the vector store's distance
/// metric relies on this.
///
/// Backend initialization is one-time and blocking; a provider that fails
/// to initialize must fail fast at startup rather than serve queries
/// half-initialized.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding vectors for a batch of text inputs, preserving
    /// input order, one vector per input.
    ///
    /// An empty batch returns an empty `Vec` without invoking the backend.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[text]).await?;
        Ok(results.pop().unwrap_or_default())
    }

    /// Return the dimensionality of embeddings produced by this provider.
    ///
    /// Fixed for the provider's lifetime; every vector stored in or queried
    /// against one index has this length.
    fn dimensions(&self) -> usize;

    /// Return the query/passage tagging convention of the model.
    fn convention(&self) -> EncodingConvention {
        EncodingConvention::Symmetric
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left unchanged.
pub(crate) fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asymmetric_convention_tags_both_sides() {
        let convention = EncodingConvention::Asymmetric;
        assert_eq!(convention.tag_query("hours?"), "query: hours?");
        assert_eq!(convention.tag_passage("open 9-6"), "passage: open 9-6");
    }

    #[test]
    fn symmetric_convention_is_identity() {
        let convention = EncodingConvention::Symmetric;
        assert_eq!(convention.tag_query("hours?"), "hours?");
        assert_eq!(convention.tag_passage("open 9-6"), "open 9-6");
    }

    #[test]
    fn normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vectors_alone() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
