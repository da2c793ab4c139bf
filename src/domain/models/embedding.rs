use serde::{Deserialize, Serialize};

/// Fixed dimensionality of stored vectors. The vector store schema depends
/// on this value.
pub const VECTOR_DIMENSIONS: usize = 384;

/// A vector produced for one chunk, tagged with the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub model: String,
}

impl Embedding {
    pub fn new(chunk_id: String, vector: Vec<f32>, model: String) -> Self {
        Self {
            chunk_id,
            vector,
            model,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    pub fn magnitude(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

/// Configuration of the embedding model in use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    model_name: String,
    dimensions: usize,
    max_sequence_length: usize,
}

impl EmbeddingConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions: VECTOR_DIMENSIONS,
            max_sequence_length: 512,
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }
}
