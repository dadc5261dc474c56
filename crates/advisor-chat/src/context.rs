//! Application context: builds each service once and hands out shared
//! handles. The CLI is the only composition root, so construction stays
//! here instead of being scattered across commands.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use advisor_core::config::AdvisorConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::{ChatStore, Embedder, Generator, NoopReranker, VectorStore};
use advisor_ingest::Ingestor;
use advisor_model::{GeminiGenerator, HfEmbedder};
use advisor_vector::QdrantGateway;

use crate::orchestrator::QueryOrchestrator;
use crate::store::SqliteChatStore;

pub struct AdvisorContext {
    pub config: AdvisorConfig,
    pub store: Arc<dyn VectorStore>,
    pub chat_store: Arc<dyn ChatStore>,
    pub ingestor: Ingestor,
    embedder: OnceLock<Arc<dyn Embedder>>,
    orchestrator: OnceLock<QueryOrchestrator>,
}

impl AdvisorContext {
    pub fn initialize(config: AdvisorConfig) -> Result<Self> {
        let store: Arc<dyn VectorStore> = Arc::new(QdrantGateway::new(&config.qdrant)?);

        let db_path: PathBuf = shellexpand::tilde(&config.chat.db_path).to_string().into();
        let chat_store: Arc<dyn ChatStore> = Arc::new(SqliteChatStore::open(&db_path)?);

        let ingestor = Ingestor::new(&config.ingest)?;

        Ok(Self {
            config,
            store,
            chat_store,
            ingestor,
            embedder: OnceLock::new(),
            orchestrator: OnceLock::new(),
        })
    }

    /// Built on first use: constructing the client requires an embedding
    /// API key, which commands like `history` and `collections` never need.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = self.embedder.get() {
            return Ok(embedder.clone());
        }
        let embedder: Arc<dyn Embedder> = Arc::new(HfEmbedder::new(&self.config.embedding)?);
        Ok(self.embedder.get_or_init(|| embedder).clone())
    }

    /// Built on first use; needs both the embedding and generation API keys.
    pub fn orchestrator(&self) -> Result<&QueryOrchestrator> {
        if let Some(orchestrator) = self.orchestrator.get() {
            return Ok(orchestrator);
        }
        let embedder = self.embedder()?;
        let generator: Arc<dyn Generator> = Arc::new(GeminiGenerator::new(&self.config.generation)?);
        let orchestrator = QueryOrchestrator::new(
            self.store.clone(),
            embedder,
            generator,
            self.chat_store.clone(),
            Arc::new(NoopReranker),
            self.config.retrieval.clone(),
            self.config.chat.cache_active,
        );
        Ok(self.orchestrator.get_or_init(|| orchestrator))
    }

    /// Actor recorded in the usage log; the CLI has no login, so the OS
    /// user stands in for the portal username.
    pub fn actor_identity() -> String {
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".to_string())
    }
}

impl AdvisorContext {
    /// Convenience for commands that need a collection to exist first.
    pub async fn require_collection(&self, name: &str) -> Result<()> {
        let collections = self.store.list_collections().await?;
        if collections.iter().any(|c| c.name == name) {
            Ok(())
        } else {
            Err(AdvisorError::CollectionNotFound(name.to_string()))
        }
    }
}
