//! Remote model clients for uni-advisor.
//!
//! [`HfEmbedder`] maps text to vectors through the Hugging Face
//! Inference API; [`GeminiGenerator`] produces grounded Vietnamese
//! answers through Gemini's OpenAI-compatible chat endpoint.

pub mod embedding;
pub mod generation;
pub mod prompt;

pub use embedding::HfEmbedder;
pub use generation::GeminiGenerator;
