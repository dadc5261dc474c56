//! Gemini generation through the OpenAI-compatible chat endpoint.
//!
//! One user message per call (the full grounded prompt), fixed sampling
//! parameters, bounded retry. Answers are post-processed: exact
//! duplicate sentences are dropped (first occurrence wins) and the
//! reminder footer is appended once.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use advisor_core::config::GenerationConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::Generator;
use advisor_core::types::ScoredChunk;

use crate::prompt::{REMINDER_FOOTER, build_prompt};

pub struct GeminiGenerator {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(cfg: &GenerationConfig) -> Result<Self> {
        let api_key = if cfg.api_key.is_empty() {
            std::env::var("GEMINI_API_KEY").unwrap_or_default()
        } else {
            cfg.api_key.clone()
        };
        if api_key.is_empty() {
            return Err(AdvisorError::Config(
                "no generation API key: set generation.api_key or GEMINI_API_KEY".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::Generation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", cfg.endpoint.trim_end_matches('/')),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
            max_retries: cfg.max_retries.max(1),
        })
    }

    async fn chat_once(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "top_p": self.top_p,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let resp = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::Generation(format!("connection failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Generation(format!("HTTP {status}: {text}")));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| AdvisorError::Generation(format!("invalid response body: {e}")))?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdvisorError::Generation("no content in response".into()))
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, question: &str, context: &[ScoredChunk]) -> Result<String> {
        let prompt = build_prompt(question, context);
        let mut last_err = AdvisorError::Generation("no attempts made".into());
        for attempt in 1..=self.max_retries {
            match self.chat_once(&prompt).await {
                Ok(raw) => return Ok(postprocess(&raw)),
                Err(e) => {
                    tracing::warn!(attempt, max = self.max_retries, "generation attempt failed: {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

/// Drop exact duplicate sentences (first occurrence wins) and append
/// the reminder footer once.
pub fn postprocess(raw: &str) -> String {
    let mut deduped = dedup_sentences(raw);
    // Marker check so a model that echoes the footer doesn't get it twice.
    if !deduped.contains("Lưu ý: thông tin mang tính tham khảo") {
        deduped.push_str(REMINDER_FOOTER);
    }
    deduped
}

fn dedup_sentences(text: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out = String::with_capacity(text.len());
    for piece in split_sentences(text) {
        let key = piece.trim().to_string();
        if key.is_empty() {
            out.push_str(&piece);
            continue;
        }
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push_str(&piece);
    }
    out
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?' | '。') {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_drops_exact_repeats_first_wins() {
        assert_eq!(dedup_sentences("A. B. B. C."), "A. B. C.");
    }

    #[test]
    fn test_dedup_keeps_distinct_sentences() {
        let text = "Học phí là 15 triệu. Xét tuyển học bạ từ tháng 3.";
        assert_eq!(dedup_sentences(text), text);
    }

    #[test]
    fn test_postprocess_appends_footer_once() {
        let once = postprocess("Học phí là 15 triệu.");
        assert!(once.ends_with(REMINDER_FOOTER));
        let twice = postprocess(&once);
        assert_eq!(twice.matches("Lưu ý: thông tin mang tính tham khảo").count(), 1);
    }

    #[test]
    fn test_postprocess_handles_question_marks() {
        let out = postprocess("Bạn cần thêm gì? Bạn cần thêm gì? Tôi sẵn sàng hỗ trợ.");
        assert_eq!(out.matches("Bạn cần thêm gì?").count(), 1);
    }

    #[test]
    fn test_requires_api_key() {
        let cfg = GenerationConfig { api_key: String::new(), ..Default::default() };
        if std::env::var("GEMINI_API_KEY").is_err() {
            assert!(matches!(GeminiGenerator::new(&cfg), Err(AdvisorError::Config(_))));
        }
    }
}
