//! Hugging Face Inference API embedder (feature-extraction pipeline).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use advisor_core::config::EmbeddingConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::Embedder;

pub struct HfEmbedder {
    http: reqwest::Client,
    url: String,
    api_key: String,
    dimension: usize,
    batch_size: usize,
}

impl HfEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Result<Self> {
        let api_key = if cfg.api_key.is_empty() {
            std::env::var("HF_API_KEY").unwrap_or_default()
        } else {
            cfg.api_key.clone()
        };
        if api_key.is_empty() {
            return Err(AdvisorError::Config(
                "no embedding API key: set embedding.api_key or HF_API_KEY".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::EmbeddingService(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!(
                "{}/pipeline/feature-extraction/{}",
                cfg.endpoint.trim_end_matches('/'),
                cfg.model
            ),
            api_key,
            dimension: cfg.dimension,
            batch_size: cfg.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "inputs": texts,
            "options": { "wait_for_model": true }
        });
        let resp = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::EmbeddingService(format!("connection failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::EmbeddingService(format!("HTTP {status}: {text}")));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| AdvisorError::EmbeddingService(format!("invalid response body: {e}")))?;
        let rows = parsed
            .as_array()
            .ok_or_else(|| AdvisorError::EmbeddingService("expected an array of vectors".into()))?;

        let mut vectors = Vec::with_capacity(rows.len());
        for row in rows {
            let vector: Vec<f32> = row
                .as_array()
                .ok_or_else(|| AdvisorError::EmbeddingService("expected a float vector".into()))?
                .iter()
                .filter_map(|v| v.as_f64())
                .map(|f| f as f32)
                .collect();
            if vector.len() != self.dimension {
                return Err(AdvisorError::DimensionMismatch {
                    got: vector.len(),
                    expected: self.dimension,
                });
            }
            vectors.push(vector);
        }
        if vectors.len() != texts.len() {
            return Err(AdvisorError::EmbeddingService(format!(
                "got {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HfEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AdvisorError::EmbeddingService("empty embedding response".into()))
    }
}
