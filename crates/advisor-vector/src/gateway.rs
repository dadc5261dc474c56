//! Qdrant REST gateway.
//!
//! Collections use cosine distance, one named vector slot, vector size
//! taken from the embedder at creation time. Each collection name has a
//! read-write lock: upload and delete hold the write half, search and
//! get_store the read half, so a force-recreate destroy-then-create can
//! never interleave with a concurrent search on the same name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use advisor_core::config::QdrantConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::{Embedder, VectorStore};
use advisor_core::types::{
    Chunk, CollectionInfo, Metadata, RetrievalResult, ScoredChunk, SearchKind, StoreHandle,
};

use crate::search::mmr;

pub struct QdrantGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    collection_locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl QdrantGateway {
    pub fn new(cfg: &QdrantConfig) -> Result<Self> {
        let api_key = if cfg.api_key.is_empty() {
            std::env::var("QDRANT_API_KEY").unwrap_or_default()
        } else {
            cfg.api_key.clone()
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::Store(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key,
            collection_locks: Mutex::new(HashMap::new()),
        })
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("api-key", &self.api_key)
        }
    }

    /// Writers (upload, delete) take the write half, readers (search,
    /// get_store) the read half.
    async fn collection_lock(&self, collection: &str) -> Arc<RwLock<()>> {
        let mut locks = self.collection_locks.lock().await;
        locks.entry(collection.to_string()).or_default().clone()
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = req
            .send()
            .await
            .map_err(|e| AdvisorError::Store(format!("{what}: connection failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Store(format!("{what}: HTTP {status}: {text}")));
        }
        resp.json()
            .await
            .map_err(|e| AdvisorError::Store(format!("{what}: invalid response body: {e}")))
    }

    /// Vector size of an existing collection, or `None` when absent.
    async fn collection_size(&self, name: &str) -> Result<Option<(usize, u64)>> {
        let url = format!("{}/collections/{name}", self.base_url);
        let resp = self
            .apply_auth(self.http.get(&url))
            .send()
            .await
            .map_err(|e| AdvisorError::Store(format!("get collection: connection failed: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Store(format!("get collection: HTTP {status}: {text}")));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdvisorError::Store(format!("get collection: invalid body: {e}")))?;
        let size = body["result"]["config"]["params"]["vectors"]["size"]
            .as_u64()
            .ok_or_else(|| {
                AdvisorError::Store(format!("collection '{name}' has no vector size in config"))
            })? as usize;
        let points = body["result"]["points_count"].as_u64().unwrap_or(0);
        Ok(Some((size, points)))
    }

    async fn create_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        let url = format!("{}/collections/{name}", self.base_url);
        let body = json!({
            "vectors": { "size": vector_size, "distance": "Cosine" }
        });
        self.send(self.apply_auth(self.http.put(&url).json(&body)), "create collection")
            .await?;
        tracing::info!(collection = name, vector_size, "created collection");
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let url = format!("{}/collections/{name}", self.base_url);
        self.send(self.apply_auth(self.http.delete(&url)), "delete collection")
            .await?;
        Ok(())
    }

    /// Make sure `collection` exists with `vector_size`, recreating it
    /// when asked. Errors on a size mismatch instead of silently
    /// appending incompatible vectors.
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
        force_recreate: bool,
    ) -> Result<()> {
        match self.collection_size(collection).await? {
            Some(_) if force_recreate => {
                tracing::info!(collection, "force recreate: dropping existing collection");
                self.drop_collection(collection).await?;
                self.create_collection(collection, vector_size).await
            }
            Some((existing, _)) if existing != vector_size => Err(AdvisorError::DimensionMismatch {
                got: vector_size,
                expected: existing,
            }),
            Some(_) => Ok(()),
            None => self.create_collection(collection, vector_size).await,
        }
    }

    async fn upsert_points(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
        expected_dim: usize,
    ) -> Result<()> {
        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if vector.len() != expected_dim {
                return Err(AdvisorError::DimensionMismatch {
                    got: vector.len(),
                    expected: expected_dim,
                });
            }
            points.push(json!({
                "id": Uuid::new_v4().to_string(),
                "vector": vector,
                "payload": {
                    "text": chunk.text,
                    "metadata": chunk.metadata,
                    "source": chunk.source_id,
                }
            }));
        }
        let url = format!("{}/collections/{collection}/points?wait=true", self.base_url);
        let body = json!({ "points": points });
        self.send(self.apply_auth(self.http.put(&url).json(&body)), "upsert points")
            .await?;
        Ok(())
    }

    async fn query_points(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
        with_vector: bool,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/collections/{collection}/points/query", self.base_url);
        let mut body = json!({
            "query": query_vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": with_vector,
        });
        if let Some(threshold) = score_threshold {
            body["score_threshold"] = json!(threshold);
        }
        let resp = self
            .send(self.apply_auth(self.http.post(&url).json(&body)), "query points")
            .await?;
        Ok(resp["result"]["points"].as_array().cloned().unwrap_or_default())
    }
}

fn point_to_chunk(point: &Value) -> ScoredChunk {
    let payload = &point["payload"];
    let metadata: Metadata = payload["metadata"].as_object().cloned().unwrap_or_default();
    ScoredChunk {
        text: payload["text"].as_str().unwrap_or_default().to_string(),
        metadata,
        score: point["score"].as_f64().unwrap_or(0.0) as f32,
    }
}

fn point_vector(point: &Value) -> Vec<f32> {
    point["vector"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_f64()).map(|f| f as f32).collect())
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for QdrantGateway {
    async fn upload(
        &self,
        collection: &str,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        force_recreate: bool,
    ) -> Result<()> {
        let lock = self.collection_lock(collection).await;
        let _guard = lock.write().await;

        let dim = embedder.dimension();
        self.ensure_collection(collection, dim, force_recreate).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_documents(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(AdvisorError::EmbeddingService(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        self.upsert_points(collection, chunks, vectors, dim).await?;
        tracing::info!(collection, points = chunks.len(), "upserted points");
        Ok(())
    }

    async fn get_store(&self, collection: &str) -> Result<StoreHandle> {
        let lock = self.collection_lock(collection).await;
        let _guard = lock.read().await;

        match self.collection_size(collection).await? {
            Some((vector_size, _)) => Ok(StoreHandle {
                collection: collection.to_string(),
                vector_size,
            }),
            None => Err(AdvisorError::CollectionNotFound(collection.to_string())),
        }
    }

    async fn search(
        &self,
        handle: &StoreHandle,
        query_vector: &[f32],
        kind: SearchKind,
        k: usize,
    ) -> Result<RetrievalResult> {
        if query_vector.len() != handle.vector_size {
            return Err(AdvisorError::DimensionMismatch {
                got: query_vector.len(),
                expected: handle.vector_size,
            });
        }
        let lock = self.collection_lock(&handle.collection).await;
        let _guard = lock.read().await;

        match kind {
            SearchKind::Similarity => {
                let points = self
                    .query_points(&handle.collection, query_vector, k, None, false)
                    .await?;
                Ok(points.iter().map(point_to_chunk).collect())
            }
            SearchKind::ScoreThreshold { threshold } => {
                let points = self
                    .query_points(&handle.collection, query_vector, k, Some(threshold), false)
                    .await?;
                Ok(points.iter().map(point_to_chunk).collect())
            }
            SearchKind::Mmr { fetch_k, lambda } => {
                let points = self
                    .query_points(&handle.collection, query_vector, fetch_k.max(k), None, true)
                    .await?;
                let candidates: Vec<(Vec<f32>, ScoredChunk)> = points
                    .iter()
                    .map(|p| (point_vector(p), point_to_chunk(p)))
                    .collect();
                Ok(mmr(query_vector, candidates, lambda, k))
            }
        }
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let url = format!("{}/collections", self.base_url);
        let resp = self
            .send(self.apply_auth(self.http.get(&url)), "list collections")
            .await?;
        let names: Vec<String> = resp["result"]["collections"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut infos = Vec::with_capacity(names.len());
        for name in names {
            if let Some((vector_size, point_count)) = self.collection_size(&name).await? {
                infos.push(CollectionInfo {
                    name,
                    vector_size,
                    distance_metric: "Cosine".to_string(),
                    point_count,
                });
            }
        }
        Ok(infos)
    }

    async fn delete_collection(&self, name: &str) -> bool {
        let lock = self.collection_lock(name).await;
        let _guard = lock.write().await;

        // Deleting a collection that never existed is a no-op failure.
        match self.collection_size(name).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(collection = name, "delete precheck failed: {e}");
                return false;
            }
        }
        if let Err(e) = self.drop_collection(name).await {
            tracing::warn!(collection = name, "delete request failed: {e}");
        }
        // Success is "confirmed absent", not "delete returned 200".
        match self.collection_size(name).await {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                tracing::warn!(collection = name, "could not confirm deletion: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 4])
        }
    }

    /// Canned Qdrant speaking just enough HTTP for the gateway. Records
    /// every request as "METHOD path" in arrival order and holds DELETE
    /// responses for `delete_delay` to widen the destroy/create window.
    struct MockQdrant {
        log: Arc<StdMutex<Vec<String>>>,
        deleted: Arc<StdMutex<HashSet<String>>>,
        delete_delay: Duration,
    }

    impl MockQdrant {
        async fn spawn(delete_delay: Duration) -> (String, Arc<StdMutex<Vec<String>>>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let log = Arc::new(StdMutex::new(Vec::new()));
            let server = Arc::new(Self {
                log: log.clone(),
                deleted: Arc::new(StdMutex::new(HashSet::new())),
                delete_delay,
            });
            tokio::spawn(async move {
                loop {
                    let Ok((sock, _)) = listener.accept().await else {
                        return;
                    };
                    let server = server.clone();
                    tokio::spawn(async move { server.handle(sock).await });
                }
            });
            (base_url, log)
        }

        async fn handle(&self, mut sock: TcpStream) {
            let mut buf = Vec::new();
            let mut tmp = [0u8; 8192];
            let request_line = loop {
                let Ok(n) = sock.read(&mut tmp).await else {
                    return;
                };
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&tmp[..n]);
                let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break head.lines().next().unwrap_or_default().to_string();
                }
            };
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts.next().unwrap_or_default().to_string();
            self.log.lock().unwrap().push(format!("{method} {path}"));

            let name = path
                .strip_prefix("/collections/")
                .map(|rest| rest.split(['/', '?']).next().unwrap_or_default().to_string())
                .unwrap_or_default();
            let (status, body) = if path.ends_with("/points/query") {
                ("200 OK", r#"{"result":{"points":[]}}"#)
            } else if path.contains("/points") {
                ("200 OK", r#"{"result":{"status":"completed"}}"#)
            } else if method == "DELETE" {
                tokio::time::sleep(self.delete_delay).await;
                self.deleted.lock().unwrap().insert(name);
                ("200 OK", r#"{"result":true}"#)
            } else if method == "PUT" {
                self.deleted.lock().unwrap().remove(&name);
                ("200 OK", r#"{"result":true}"#)
            } else if method == "GET" {
                if name.starts_with("vang") || self.deleted.lock().unwrap().contains(&name) {
                    ("404 Not Found", r#"{"status":{"error":"Not found"}}"#)
                } else {
                    (
                        "200 OK",
                        r#"{"result":{"config":{"params":{"vectors":{"size":4}}},"points_count":2}}"#,
                    )
                }
            } else {
                ("200 OK", r#"{"result":true}"#)
            };
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = sock.write_all(resp.as_bytes()).await;
        }
    }

    fn test_gateway(base_url: String) -> QdrantGateway {
        QdrantGateway::new(&QdrantConfig {
            url: base_url,
            api_key: "test-key".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_waits_out_force_recreate() {
        let (base_url, log) = MockQdrant::spawn(Duration::from_millis(200)).await;
        let gateway = Arc::new(test_gateway(base_url));

        let chunks = vec![Chunk {
            text: "Điểm chuẩn CNTT năm 2024".to_string(),
            metadata: Metadata::new(),
            source_id: "diemchuan.csv".to_string(),
        }];
        let writer = gateway.clone();
        let upload = tokio::spawn(async move {
            writer.upload("tuyen-sinh", &chunks, &FlatEmbedder, true).await
        });
        let reader = gateway.clone();
        let search = tokio::spawn(async move {
            // Arrives while the DELETE response is still pending.
            tokio::time::sleep(Duration::from_millis(50)).await;
            let handle = StoreHandle {
                collection: "tuyen-sinh".to_string(),
                vector_size: 4,
            };
            reader.search(&handle, &[0.5; 4], SearchKind::Similarity, 3).await
        });
        upload.await.unwrap().unwrap();
        search.await.unwrap().unwrap();

        let log = log.lock().unwrap().clone();
        let delete = log.iter().position(|e| e.starts_with("DELETE")).unwrap();
        let create = log
            .iter()
            .position(|e| e == "PUT /collections/tuyen-sinh")
            .unwrap();
        let query = log.iter().position(|e| e.ends_with("/points/query")).unwrap();
        assert!(delete < create, "recreate must destroy first: {log:?}");
        assert!(query > create, "search interleaved with recreate: {log:?}");
    }

    #[tokio::test]
    async fn test_delete_absent_collection_returns_false() {
        let (base_url, log) = MockQdrant::spawn(Duration::ZERO).await;
        let gateway = test_gateway(base_url);

        assert!(!gateway.delete_collection("vang-mat").await);
        assert!(!gateway.delete_collection("vang-mat").await);

        let log = log.lock().unwrap().clone();
        assert!(
            log.iter().all(|e| !e.starts_with("DELETE")),
            "no delete should be issued for an absent collection: {log:?}"
        );
    }

    #[tokio::test]
    async fn test_delete_existing_collection_confirms_absence() {
        let (base_url, _log) = MockQdrant::spawn(Duration::ZERO).await;
        let gateway = test_gateway(base_url);

        assert!(gateway.delete_collection("tuyen-sinh").await);
        // A second delete sees nothing left to remove.
        assert!(!gateway.delete_collection("tuyen-sinh").await);
    }

    #[test]
    fn test_point_to_chunk_parses_payload() {
        let point = json!({
            "score": 0.87,
            "payload": {
                "text": "Học phí ngành CNTT là 15 triệu/năm",
                "metadata": { "source": "tuyensinh.csv", "row": 3 },
                "source": "tuyensinh.csv",
            }
        });
        let chunk = point_to_chunk(&point);
        assert_eq!(chunk.text, "Học phí ngành CNTT là 15 triệu/năm");
        assert!((chunk.score - 0.87).abs() < 1e-6);
        assert_eq!(chunk.metadata["row"], json!(3));
    }

    #[test]
    fn test_point_to_chunk_tolerates_missing_fields() {
        let chunk = point_to_chunk(&json!({}));
        assert!(chunk.text.is_empty());
        assert_eq!(chunk.score, 0.0);
        assert!(chunk.metadata.is_empty());
    }

    #[test]
    fn test_point_vector_extraction() {
        let point = json!({ "vector": [0.1, 0.2, 0.3] });
        let v = point_vector(&point);
        assert_eq!(v.len(), 3);
        assert!((v[1] - 0.2).abs() < 1e-6);
        assert!(point_vector(&json!({})).is_empty());
    }
}
