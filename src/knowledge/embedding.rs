//! Embedding seam and vector similarity.

use crate::llm::LlmError;

/// Embedding model abstraction. One vector per input text.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::ResponseParsing("empty embedding batch".into()))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.01);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.01);
    }

    #[test]
    fn mismatched_or_zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn mock_embedder_is_word_sensitive() {
        let embedder = testing::MockEmbedder::new();
        let refund = embedder.embed("refund policy days").await.unwrap();
        let refund_query = embedder.embed("refund days").await.unwrap();
        let shipping = embedder.embed("international shipping customs").await.unwrap();

        let close = cosine_similarity(&refund, &refund_query);
        let far = cosine_similarity(&refund, &shipping);
        assert!(close > far, "expected {close} > {far}");
    }

    #[tokio::test]
    async fn embed_delegates_to_batch() {
        let embedder = testing::MockEmbedder::new();
        let single = embedder.embed("hello world").await.unwrap();
        let batch = embedder.embed_batch(&["hello world"]).await.unwrap();
        assert_eq!(single, batch[0]);
    }
}
