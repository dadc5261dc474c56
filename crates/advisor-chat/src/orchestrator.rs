//! Query orchestrator.
//!
//! Resolves the active collection, short-circuits to the maintenance
//! answer when none is set, and otherwise runs retrieve → rerank →
//! generate → log. Any failure past the maintenance check is caught at
//! this boundary, logged, and replaced by a fixed apology so the caller
//! always gets an answer string.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use advisor_core::config::RetrievalConfig;
use advisor_core::error::Result;
use advisor_core::traits::{ChatStore, Embedder, Generator, Reranker, VectorStore};
use advisor_core::types::{ChatRecord, RetrievalResult};

/// Shown when no active collection is configured. No model call is made.
pub const MAINTENANCE_MESSAGE: &str = "Hệ thống đang được bảo trì để cải thiện dịch vụ. \
     Vui lòng quay lại sau. Cảm ơn sự kiên nhẫn của bạn!";

/// Shown when the query path fails after the maintenance check.
pub const ERROR_APOLOGY: &str = "Hệ thống vừa cập nhật, vui lòng thử lại sau.";

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    pub elapsed_seconds: f64,
    pub retrieved: RetrievalResult,
}

pub struct QueryOrchestrator {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    chat_store: Arc<dyn ChatStore>,
    reranker: Arc<dyn Reranker>,
    retrieval: RetrievalConfig,
    /// `Some` only when the pointer is cached per session.
    cached_active: Option<Mutex<Option<Option<String>>>>,
}

impl QueryOrchestrator {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        chat_store: Arc<dyn ChatStore>,
        reranker: Arc<dyn Reranker>,
        retrieval: RetrievalConfig,
        cache_active: bool,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            chat_store,
            reranker,
            retrieval,
            cached_active: cache_active.then(|| Mutex::new(None)),
        }
    }

    /// Answer one question. Never fails: query-path errors become the
    /// fixed apology with zero elapsed time.
    pub async fn answer(&self, question: &str, actor: &str) -> ChatOutcome {
        match self.try_answer(question, actor).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(actor, "query failed: {e}");
                ChatOutcome {
                    answer: ERROR_APOLOGY.to_string(),
                    elapsed_seconds: 0.0,
                    retrieved: Vec::new(),
                }
            }
        }
    }

    async fn try_answer(&self, question: &str, actor: &str) -> Result<ChatOutcome> {
        // Maintenance check comes before any model or store call.
        let Some(collection) = self.active_collection().await? else {
            tracing::info!(actor, "no active collection, answering in maintenance mode");
            return Ok(ChatOutcome {
                answer: MAINTENANCE_MESSAGE.to_string(),
                elapsed_seconds: 0.0,
                retrieved: Vec::new(),
            });
        };

        let start = Instant::now();
        let handle = self.store.get_store(&collection).await?;
        let query_vector = self.embedder.embed_query(question).await?;
        let mut retrieved = self
            .store
            .search(&handle, &query_vector, self.retrieval.search(), self.retrieval.k)
            .await?;
        if self.retrieval.rerank_top_n > 0 {
            retrieved = self.reranker.rerank(question, retrieved, self.retrieval.rerank_top_n);
        }
        tracing::debug!(collection, hits = retrieved.len(), "retrieval complete");

        let answer = self.generator.generate(question, &retrieved).await?;
        let elapsed_seconds = start.elapsed().as_secs_f64();

        let record = ChatRecord::new(question, &answer, elapsed_seconds, actor);
        self.chat_store.append(&record).await?;

        Ok(ChatOutcome { answer, elapsed_seconds, retrieved })
    }

    async fn active_collection(&self) -> Result<Option<String>> {
        match &self.cached_active {
            None => self.chat_store.get_active().await,
            Some(cache) => {
                let mut slot = cache.lock().await;
                if let Some(value) = slot.as_ref() {
                    return Ok(value.clone());
                }
                let value = self.chat_store.get_active().await?;
                *slot = Some(value.clone());
                Ok(value)
            }
        }
    }
}
