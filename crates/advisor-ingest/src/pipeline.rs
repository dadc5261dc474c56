//! Ingestion pipeline: load → chunk → guard → embed → upsert.
//!
//! Guard rails mirror the admin upload flow: a file-size cap checked
//! before parsing, a duplicate-name check when the caller expects to
//! create a fresh collection, and an empty-content check so zero chunks
//! are never uploaded. Temporary artifacts written for buffer ingestion
//! are removed on every exit path via an RAII guard.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use advisor_core::config::IngestConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::{Embedder, VectorStore};

use crate::chunker::Chunker;
use crate::loader::{DocumentLoader, DocumentSource};

/// Outcome of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub collection: String,
    pub chunk_count: usize,
    pub elapsed_seconds: f64,
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Destroy and recreate an existing collection of the same name.
    pub force_recreate: bool,
    /// Fail when the collection already exists (admin "create new
    /// database" flow).
    pub expect_new: bool,
}

pub struct Ingestor {
    loader: DocumentLoader,
    chunker: Chunker,
    max_file_size_bytes: u64,
}

impl Ingestor {
    pub fn new(cfg: &IngestConfig) -> Result<Self> {
        Ok(Self {
            loader: DocumentLoader::new(Duration::from_secs(cfg.web_timeout_secs))?,
            chunker: Chunker::new(cfg.chunk_size, cfg.chunk_overlap),
            max_file_size_bytes: cfg.max_file_size_mb * 1024 * 1024,
        })
    }

    /// Run the full pipeline for one source document.
    pub async fn ingest(
        &self,
        source: &DocumentSource,
        collection: &str,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        let start = Instant::now();

        self.check_file_size(source)?;
        if options.expect_new {
            let existing = store.list_collections().await?;
            if existing.iter().any(|c| c.name == collection) {
                return Err(AdvisorError::Store(format!(
                    "database name '{collection}' already exists"
                )));
            }
        }

        let units = self.loader.load(source).await?;
        let chunks = self.chunker.split(&units);
        if chunks.is_empty() {
            return Err(AdvisorError::EmptyContent);
        }
        tracing::info!(
            source = %source.id(),
            collection,
            chunks = chunks.len(),
            "ingesting document"
        );

        store
            .upload(collection, &chunks, embedder, options.force_recreate)
            .await?;

        Ok(IngestReport {
            collection: collection.to_string(),
            chunk_count: chunks.len(),
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Ingest from an in-memory buffer (admin upload), parking the bytes
    /// in a temp file that is removed whichever way this returns.
    pub async fn ingest_buffer(
        &self,
        bytes: &[u8],
        extension: &str,
        collection: &str,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        if bytes.len() as u64 > self.max_file_size_bytes {
            return Err(self.too_large(bytes.len() as u64));
        }
        let artifact = TempArtifact::write(&std::env::temp_dir(), collection, extension, bytes)?;
        let source = match extension {
            "csv" => DocumentSource::Csv(artifact.path().to_path_buf()),
            _ => DocumentSource::Pdf(artifact.path().to_path_buf()),
        };
        // `artifact` drops (and unlinks) on success and on every error path.
        self.ingest(&source, collection, store, embedder, options).await
    }

    fn check_file_size(&self, source: &DocumentSource) -> Result<()> {
        let path = match source {
            DocumentSource::Pdf(p) | DocumentSource::Csv(p) => p,
            DocumentSource::Web(_) => return Ok(()),
        };
        let size = std::fs::metadata(path)
            .map_err(|e| AdvisorError::Load(format!("cannot stat {}: {e}", path.display())))?
            .len();
        if size > self.max_file_size_bytes {
            return Err(self.too_large(size));
        }
        Ok(())
    }

    fn too_large(&self, size: u64) -> AdvisorError {
        AdvisorError::Load(format!(
            "file too large: {:.2} MB (max {} MB)",
            size as f64 / (1024.0 * 1024.0),
            self.max_file_size_bytes / (1024 * 1024)
        ))
    }
}

/// Temp file removed on drop: success, handled error, or panic unwind.
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn write(dir: &Path, collection: &str, extension: &str, bytes: &[u8]) -> Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let path = dir.join(format!("{collection}_{stamp}.{extension}"));
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "failed to remove temp artifact: {e}");
        }
    }
}
