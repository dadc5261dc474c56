//! Uni-advisor configuration system.
//!
//! All connection URLs, API keys, and retrieval/chunking defaults are
//! supplied here at process start; nothing in the pipelines hardcodes a
//! secret. API keys left empty fall back to environment variables at the
//! point where the owning service is constructed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            ingest: IngestConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl AdvisorConfig {
    /// Load config from the default path (~/.uni-advisor/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::AdvisorError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::AdvisorError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AdvisorError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the uni-advisor home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".uni-advisor")
    }
}

/// Vector database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    /// Empty means "read QDRANT_API_KEY from the environment".
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String { "http://localhost:6333".into() }
fn default_store_timeout() -> u64 { 30 }

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key: String::new(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Remote embedding model (HF Inference API, feature extraction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Empty means "read HF_API_KEY from the environment".
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_endpoint() -> String { "https://api-inference.huggingface.co".into() }
fn default_embedding_model() -> String {
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".into()
}
fn default_embedding_dimension() -> usize { 384 }
fn default_embedding_batch() -> usize { 32 }
fn default_embedding_timeout() -> u64 { 30 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key: String::new(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Chat model for grounded generation (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Empty means "read GEMINI_API_KEY from the environment".
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_generation_model() -> String { "gemini-1.5-flash".into() }
fn default_temperature() -> f32 { 0.4 }
fn default_top_p() -> f32 { 0.95 }
fn default_max_tokens() -> u32 { 1000 }
fn default_max_retries() -> u32 { 3 }
fn default_generation_timeout() -> u64 { 60 }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            api_key: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

/// Retrieval policy. The two historical deployments disagreed on the
/// defaults (similarity k=3 vs. score-threshold k=15), so both are
/// expressible here; score-threshold is the shipped default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "similarity" | "score_threshold" | "mmr"
    #[serde(default = "default_search_kind")]
    pub search_kind: String,
    #[serde(default = "default_top_k")]
    pub k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
    /// Rerank output size when a reranker is configured; 0 disables.
    #[serde(default)]
    pub rerank_top_n: usize,
}

fn default_search_kind() -> String { "score_threshold".into() }
fn default_top_k() -> usize { 15 }
fn default_score_threshold() -> f32 { 0.6 }
fn default_fetch_k() -> usize { 20 }
fn default_mmr_lambda() -> f32 { 0.5 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_kind: default_search_kind(),
            k: default_top_k(),
            score_threshold: default_score_threshold(),
            fetch_k: default_fetch_k(),
            mmr_lambda: default_mmr_lambda(),
            rerank_top_n: 0,
        }
    }
}

impl RetrievalConfig {
    /// Resolve the configured strategy; unknown values fall back to the
    /// default policy.
    pub fn search(&self) -> crate::types::SearchKind {
        use crate::types::SearchKind;
        match self.search_kind.as_str() {
            "similarity" => SearchKind::Similarity,
            "mmr" => SearchKind::Mmr { fetch_k: self.fetch_k, lambda: self.mmr_lambda },
            "score_threshold" => SearchKind::ScoreThreshold { threshold: self.score_threshold },
            _ => SearchKind::default_policy(),
        }
    }
}

/// Chunking and upload guard rails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_web_timeout")]
    pub web_timeout_secs: u64,
}

fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_max_file_size_mb() -> u64 { 5 }
fn default_web_timeout() -> u64 { 20 }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size_mb: default_max_file_size_mb(),
            web_timeout_secs: default_web_timeout(),
        }
    }
}

/// Chat store location and active-pointer refresh policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// When true, the active-collection pointer is read once per session
    /// and cached; an admin switch is observed only after re-initialisation.
    /// When false (default), the pointer is re-read on every query.
    #[serde(default)]
    pub cache_active: bool,
}

fn default_db_path() -> String { "~/.uni-advisor/chat.db".into() }

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdvisorConfig::default();
        assert_eq!(config.qdrant.url, "http://localhost:6333");
        assert_eq!(config.retrieval.k, 15);
        assert_eq!(config.ingest.chunk_size, 1000);
        assert_eq!(config.ingest.chunk_overlap, 200);
        assert!(!config.chat.cache_active);
        assert!((config.generation.temperature - 0.4).abs() < 0.01);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [qdrant]
            url = "https://cluster.cloud.qdrant.io:6333"

            [retrieval]
            search_kind = "similarity"
            k = 3

            [ingest]
            chunk_overlap = 400
        "#;

        let config: AdvisorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.qdrant.url, "https://cluster.cloud.qdrant.io:6333");
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.ingest.chunk_overlap, 400);
        assert!(matches!(config.retrieval.search(), crate::types::SearchKind::Similarity));
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: AdvisorConfig = toml::from_str("").unwrap();
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.generation.max_retries, 3);
    }

    #[test]
    fn test_unknown_search_kind_falls_back() {
        let config: AdvisorConfig = toml::from_str("[retrieval]\nsearch_kind = \"typo\"").unwrap();
        assert_eq!(config.retrieval.search(), crate::types::SearchKind::default_policy());
    }
}
