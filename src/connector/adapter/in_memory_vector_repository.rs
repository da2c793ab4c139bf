use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::VectorRepository;
use crate::domain::{CodeChunk, DomainError, Embedding, SearchQuery, SearchResult};

struct Partition {
    chunks: HashMap<String, CodeChunk>,
    embeddings: HashMap<String, Embedding>,
}

/// Vector store held entirely in process memory, partitioned by repository.
/// Replacement swaps a whole partition, so readers never observe a mix of
/// two analysis runs.
pub struct InMemoryVectorRepository {
    partitions: Arc<Mutex<HashMap<String, Partition>>>,
}

impl InMemoryVectorRepository {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVectorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorRepository {
    async fn replace_repository(
        &self,
        repository_id: &str,
        chunks: &[CodeChunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError> {
        let mut chunk_map = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            chunk_map.insert(chunk.id().to_string(), chunk.clone());
        }
        let mut embedding_map = HashMap::with_capacity(embeddings.len());
        for embedding in embeddings {
            embedding_map.insert(embedding.chunk_id.clone(), embedding.clone());
        }

        let mut partitions = self.partitions.lock().await;
        partitions.insert(
            repository_id.to_string(),
            Partition {
                chunks: chunk_map,
                embeddings: embedding_map,
            },
        );

        debug!(
            "Stored {} chunks and {} embeddings for {} in memory",
            chunks.len(),
            embeddings.len(),
            repository_id
        );
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let partitions = self.partitions.lock().await;

        let repo_ids = query.repository_ids();
        let mut scored: Vec<(f32, &Partition, String)> = Vec::new();
        for (repository_id, partition) in partitions.iter() {
            if !repo_ids.is_empty() && !repo_ids.iter().any(|id| id == repository_id) {
                continue;
            }
            for embedding in partition.embeddings.values() {
                let score = cosine_similarity(query_vector, &embedding.vector);
                scored.push((score, partition, embedding.chunk_id.clone()));
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut results = Vec::new();
        for (score, partition, chunk_id) in scored {
            if results.len() >= query.limit() {
                break;
            }

            let chunk = match partition.chunks.get(&chunk_id) {
                Some(chunk) => chunk,
                None => continue,
            };

            if !query.accepts(score, chunk.language()) {
                continue;
            }

            results.push(SearchResult {
                chunk: chunk.clone(),
                score,
            });
        }

        Ok(results)
    }

    async fn delete_by_repository(&self, repository_id: &str) -> Result<(), DomainError> {
        let mut partitions = self.partitions.lock().await;
        partitions.remove(repository_id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions.values().map(|p| p.chunks.len()).sum())
    }

    async fn count_by_repository(&self, repository_id: &str) -> Result<usize, DomainError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions
            .get(repository_id)
            .map(|p| p.chunks.len())
            .unwrap_or(0))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
