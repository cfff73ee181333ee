pub mod random;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

pub use self::random::RandomEmbeddingClient;

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, Box<dyn StdError + Send + Sync>>;
}

/// Result of a best-effort embedding attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Computed(Vec<f32>),
    Unavailable(String),
}

pub async fn try_embed(client: &dyn EmbeddingClient, text: &str) -> EmbeddingOutcome {
    match client.embed(text).await {
        Ok(resp) => EmbeddingOutcome::Computed(resp.embedding),
        Err(e) => EmbeddingOutcome::Unavailable(e.to_string()),
    }
}

pub fn new_client(dimension: usize) -> Arc<dyn EmbeddingClient> {
    Arc::new(RandomEmbeddingClient::new(dimension))
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the lengths differ or either vector is empty or all
/// zeros, where the ratio is undefined.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
