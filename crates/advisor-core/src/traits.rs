//! Service traits wired together at the composition root.
//!
//! Concrete implementations live in advisor-model (embedder, generator),
//! advisor-vector (store gateway), and advisor-chat (chat store). Traits
//! keep the orchestrator and ingestion pipeline testable without network.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ChatRecord, Chunk, CollectionInfo, RetrievalResult, ScoredChunk, SearchKind, StoreHandle,
};

/// Maps text to fixed-dimension float vectors via a remote embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimensionality, fixed per instance.
    fn dimension(&self) -> usize;

    /// Batch embedding at ingestion time.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Single query embedding at question time.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Produces a grounded answer from a question plus retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &[ScoredChunk]) -> Result<String>;
}

/// Contract over the vector database: collection CRUD, upsert, search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed `chunks` and upsert them into `collection`, creating it with
    /// the embedder's dimensionality when absent. `force_recreate` destroys
    /// and recreates an existing collection of the same name first.
    async fn upload(
        &self,
        collection: &str,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        force_recreate: bool,
    ) -> Result<()>;

    /// Bind to an existing collection for querying.
    async fn get_store(&self, collection: &str) -> Result<StoreHandle>;

    /// Similarity search against a bound collection.
    async fn search(
        &self,
        handle: &StoreHandle,
        query_vector: &[f32],
        kind: SearchKind,
        k: usize,
    ) -> Result<RetrievalResult>;

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Best-effort delete: true only when the collection is confirmed
    /// absent afterwards. Never errors.
    async fn delete_collection(&self, name: &str) -> bool;
}

/// Post-retrieval re-scoring stage, applied before generation.
pub trait Reranker: Send + Sync {
    fn rerank(&self, question: &str, retrieved: RetrievalResult, top_n: usize) -> RetrievalResult;
}

/// Pass-through reranker used when no cross-encoder is configured.
pub struct NoopReranker;

impl Reranker for NoopReranker {
    fn rerank(&self, _question: &str, retrieved: RetrievalResult, top_n: usize) -> RetrievalResult {
        retrieved.into_iter().take(top_n).collect()
    }
}

/// Usage log plus the single persisted active-collection pointer.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append one usage record. Records are never mutated or deleted.
    async fn append(&self, record: &ChatRecord) -> Result<()>;

    /// Most recent records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ChatRecord>>;

    async fn count(&self) -> Result<u64>;

    /// Read the active-collection pointer, lazily creating the record with
    /// a null value on first read. `None` means "no collection configured".
    async fn get_active(&self) -> Result<Option<String>>;

    /// Point the chatbot at `name`, updating the pointer's timestamp.
    async fn set_active(&self, name: &str) -> Result<()>;
}
