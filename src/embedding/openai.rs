//! OpenAI embeddings implementation.

use super::Embedder;
use crate::error::{Result, SyllabusError};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI has a limit on inputs per embeddings request.
const BATCH_SIZE: usize = 100;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config("text-embedding-3-small", 1536)
    }

    /// Create a new OpenAI embedder with custom model and dimensions.
    pub fn with_config(model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SyllabusError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()))
                .dimensions(self.dimensions as u32)
                .build()
                .map_err(|e| SyllabusError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| SyllabusError::OpenAI(format!("Embedding API error: {}", e)))?;

            let batch = response
                .data
                .into_iter()
                .map(|e| (e.index, e.embedding))
                .collect();
            all_embeddings.extend(ordered_vectors(batch, chunk.len(), self.dimensions)?);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Put a batch back in input order and check it has one vector of the
/// expected size per input. Stored vectors must all share one dimension.
fn ordered_vectors(
    mut batch: Vec<(u32, Vec<f32>)>,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
    if batch.len() != expected {
        return Err(SyllabusError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            batch.len()
        )));
    }

    batch.sort_by_key(|(index, _)| *index);

    if let Some((_, vector)) = batch.iter().find(|(_, v)| v.len() != dimensions) {
        return Err(SyllabusError::Embedding(format!(
            "Expected {} dimensions, got {}",
            dimensions,
            vector.len()
        )));
    }

    Ok(batch.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_vectors_restores_input_order() {
        let batch = vec![(1, vec![0.0, 1.0]), (0, vec![1.0, 0.0])];
        let vectors = ordered_vectors(batch, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_ordered_vectors_rejects_mismatches() {
        assert!(ordered_vectors(vec![(0, vec![1.0])], 2, 1).is_err());
        assert!(ordered_vectors(vec![(0, vec![1.0, 2.0])], 1, 3).is_err());
    }

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new().unwrap();
        assert_eq!(embedder.dimensions(), 1536);

        let embedder = OpenAIEmbedder::with_config("text-embedding-3-large", 3072).unwrap();
        assert_eq!(embedder.dimensions(), 3072);
    }
}
