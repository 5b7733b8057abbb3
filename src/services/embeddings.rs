use anyhow::{anyhow, Result};
use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};

const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embeddings client behind course search. Optional: without an API key the
/// search endpoint reports itself unavailable instead of failing requests.
#[derive(Clone)]
pub struct Embeddings {
    client: Option<Client<OpenAIConfig>>,
}

impl Embeddings {
    pub fn from_env() -> Self {
        let client = std::env::var("OPENAI_API_KEY").ok().map(|key| {
            Client::with_config(OpenAIConfig::new().with_api_key(key))
        });
        if client.is_none() {
            tracing::warn!("OPENAI_API_KEY not set, course search disabled");
        }
        Self { client }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let client = self.client.as_ref().ok_or_else(|| anyhow!("embeddings disabled"))?;
        let request = CreateEmbeddingRequestArgs::default()
            .model(EMBEDDING_MODEL)
            .input(text)
            .build()?;
        let response = client.embeddings().create(request).await?;
        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no embedding returned"))?;
        Ok(embedding.embedding.into_iter().map(f64::from).collect())
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
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
        let v = vec![0.5, -1.0, 2.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
