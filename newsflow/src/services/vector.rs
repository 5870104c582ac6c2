//! In-memory vector index.

use super::{SearchHit, VectorSearch};
use crate::errors::ServiceError;
use async_trait::async_trait;
use parking_lot::RwLock;

#[derive(Debug, Clone)]
struct IndexedDocument {
    source_id: String,
    text: String,
    vector: Vec<f32>,
}

/// Cosine similarity of two vectors; 0.0 if either is zero or lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A brute-force cosine-similarity index held in memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    documents: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorIndex {
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let documents = self.documents.read();
        let mut hits: Vec<SearchHit> = documents
            .iter()
            .map(|doc| SearchHit {
                text: doc.text.clone(),
                score: cosine_similarity(query, &doc.vector),
                source_id: doc.source_id.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn upsert(
        &self,
        source_id: &str,
        text: &str,
        vector: Vec<f32>,
    ) -> Result<(), ServiceError> {
        if vector.is_empty() {
            return Err(ServiceError::InvalidResponse("empty vector".to_string()));
        }
        let document = IndexedDocument {
            source_id: source_id.to_string(),
            text: text.to_string(),
            vector,
        };
        let mut documents = self.documents.write();
        match documents.iter_mut().find(|d| d.source_id == source_id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        Ok(())
    }
}
