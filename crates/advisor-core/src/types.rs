//! Data types that move through the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scalar metadata attached to loader units and chunks.
pub type Metadata = Map<String, Value>;

/// One (text, metadata) unit produced by a document loader before
/// chunking: a PDF page, a CSV row, or a whole web page.
#[derive(Debug, Clone)]
pub struct Unit {
    pub text: String,
    pub metadata: Metadata,
}

impl Unit {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self { text: text.into(), metadata }
    }
}

/// A bounded-length slice of source text plus metadata, the unit of
/// embedding and retrieval. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
    pub source_id: String,
}

/// A chunk paired with its embedding vector. The vector length is fixed
/// per embedder and must match the target collection's vector size.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Ordered top-k retrieval output, ephemeral per query.
pub type RetrievalResult = Vec<ScoredChunk>;

/// Introspection record for one vector-store collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub vector_size: usize,
    pub distance_metric: String,
    pub point_count: u64,
}

/// Handle bound to an existing collection for querying.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pub collection: String,
    pub vector_size: usize,
}

/// Retrieval strategy for `VectorStore::search`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchKind {
    /// Plain top-k by score.
    Similarity,
    /// Top-k filtered to score >= threshold.
    ScoreThreshold { threshold: f32 },
    /// Maximal-marginal-relevance re-ranking over a larger candidate pool.
    Mmr { fetch_k: usize, lambda: f32 },
}

impl SearchKind {
    /// Deployment default: score-threshold retrieval at 0.6.
    pub fn default_policy() -> Self {
        SearchKind::ScoreThreshold { threshold: 0.6 }
    }
}

/// Append-only usage record written after every answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub question: String,
    pub answer: String,
    pub processing_time_seconds: f64,
    pub input_word_count: usize,
    pub output_word_count: usize,
    pub timestamp: DateTime<Utc>,
    pub actor_identity: String,
}

impl ChatRecord {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        processing_time_seconds: f64,
        actor_identity: impl Into<String>,
    ) -> Self {
        let question = question.into();
        let answer = answer.into();
        Self {
            input_word_count: question.split_whitespace().count(),
            output_word_count: answer.split_whitespace().count(),
            question,
            answer,
            processing_time_seconds,
            timestamp: Utc::now(),
            actor_identity: actor_identity.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_record_word_counts() {
        let r = ChatRecord::new("học phí ngành CNTT", "15 triệu mỗi năm", 1.25, "sv01");
        assert_eq!(r.input_word_count, 4);
        assert_eq!(r.output_word_count, 4);
        assert!((r.processing_time_seconds - 1.25).abs() < f64::EPSILON);
        assert_eq!(r.actor_identity, "sv01");
    }

    #[test]
    fn test_default_search_policy() {
        match SearchKind::default_policy() {
            SearchKind::ScoreThreshold { threshold } => assert!((threshold - 0.6).abs() < 1e-6),
            other => panic!("unexpected default: {other:?}"),
        }
    }
}
