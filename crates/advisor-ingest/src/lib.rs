//! # Advisor Ingest
//!
//! Document ingestion for the admissions knowledge base:
//! - **Loaders**: PDF (one unit per page), CSV (one unit per row, with
//!   encoding detection), web pages (tag-stripped, alphabet-filtered)
//! - **Chunker**: recursive separator-priority splitting with overlap
//! - **Pipeline**: load, split, guard, embed, upsert, with scoped
//!   temp-file cleanup on every exit path

pub mod chunker;
pub mod loader;
pub mod pipeline;

pub use chunker::Chunker;
pub use loader::{DocumentLoader, DocumentSource};
pub use pipeline::{IngestOptions, IngestReport, Ingestor, TempArtifact};
