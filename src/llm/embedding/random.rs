use async_trait::async_trait;
use rand::Rng;
use std::error::Error as StdError;
use super::{ EmbeddingClient, EmbeddingResponse, cosine_similarity };

/// Placeholder embedder. Returns uniformly random vectors in `[0, 1)`; the
/// output carries no meaning and differs on every call, so similarity scores
/// between two embeddings are noise.
#[derive(Debug, Clone)]
pub struct RandomEmbeddingClient {
    dimension: usize,
}

impl RandomEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Similarity between the embeddings of two texts.
    pub async fn similarity(&self, a: &str, b: &str) -> Result<f32, Box<dyn StdError + Send + Sync>> {
        let va = self.embed(a).await?.embedding;
        let vb = self.embed(b).await?.embedding;
        Ok(cosine_similarity(&va, &vb))
    }
}

impl Default for RandomEmbeddingClient {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingClient for RandomEmbeddingClient {
    async fn embed(
        &self,
        _text: &str
    ) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>> {
        let mut rng = rand::thread_rng();
        let embedding = (0..self.dimension).map(|_| rng.gen::<f32>()).collect();
        Ok(EmbeddingResponse { embedding })
    }
}
