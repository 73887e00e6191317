use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;

use pdfqa_core::config::{validate_weights, Config, Settings};
use pdfqa_core::error::{Error, Result};
use pdfqa_core::traits::{Embedder, LanguageModel};
use pdfqa_core::types::{Document, DocumentId, QueryOptions, RetrievalResult};
use pdfqa_core::Chunker;
use pdfqa_embed::build_embedder;
use pdfqa_llm::build_language_model;
use pdfqa_text::{Bm25Params, SparseIndex};
use pdfqa_vector::DenseIndex;

use crate::fusion::fuse;
use crate::snapshot::{self, Snapshot, FORMAT_VERSION};
use crate::store::{reassemble, ChunkStore, DocumentRecord};
use crate::synthesizer::{Answer, AnswerSynthesizer, Source};

/// Documents embedded concurrently by `ingest_many`.
const INGEST_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub documents: usize,
    pub chunks: usize,
    pub embedder_id: String,
    pub dimension: usize,
    pub model: String,
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub title: String,
    pub summary: String,
}

/// Hybrid retrieval + answer engine.
///
/// `gate` orders index visibility: queries hold it shared while both strategies run,
/// ingest and delete take it exclusively only to commit the chunk store, the dense
/// index and the sparse index together. Embedding happens before the gate is taken.
pub struct QaEngine {
    settings: Settings,
    chunker: Chunker,
    store: RwLock<ChunkStore>,
    dense: Arc<DenseIndex>,
    sparse: Arc<SparseIndex>,
    synthesizer: AnswerSynthesizer,
    gate: tokio::sync::RwLock<()>,
    snapshot_path: Option<PathBuf>,
    autosave_enabled: bool,
}

impl QaEngine {
    /// Build every backend from layered configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = config.settings()?;
        let embedder = build_embedder(&settings.embedding)?;
        let model = build_language_model(&settings.llm)?;
        Ok(Self::new(settings, embedder, model)?)
    }

    /// Validates `settings`, then restores the configured snapshot if there is one.
    /// An unusable snapshot is logged, renamed out of the way and the engine starts empty.
    /// If it cannot be renamed, autosave stays off so only `save_snapshot` replaces it.
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>, model: Arc<dyn LanguageModel>) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.embedding.dimension {
            return Err(Error::Configuration(format!(
                "embedder '{}' produces {} dims but embedding.dimension is {}",
                embedder.id(),
                embedder.dim(),
                settings.embedding.dimension
            )));
        }
        let chunker = Chunker::new(settings.chunking.clone())?;
        let synthesizer = AnswerSynthesizer::new(model, &settings.llm)?;
        let params = Bm25Params::from(&settings.retrieval);
        let snapshot_path = settings.storage.resolved_snapshot_path();

        let mut autosave_enabled = settings.storage.autosave;
        let restored = match snapshot_path.as_deref() {
            Some(path) => restore(path, &embedder, params).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "snapshot unusable; starting with an empty index");
                if let Err(e) = snapshot::set_aside(path) {
                    tracing::warn!(error = %e, "could not set the old snapshot aside; autosave disabled");
                    autosave_enabled = false;
                }
                None
            }),
            None => None,
        };
        let (store, dense, sparse) = restored.unwrap_or_else(|| (ChunkStore::new(), DenseIndex::new(Arc::clone(&embedder)), SparseIndex::new(params)));

        Ok(Self {
            settings,
            chunker,
            store: RwLock::new(store),
            dense: Arc::new(dense),
            sparse: Arc::new(sparse),
            synthesizer,
            gate: tokio::sync::RwLock::new(()),
            snapshot_path,
            autosave_enabled,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn default_options(&self) -> QueryOptions {
        self.settings.retrieval.default_options()
    }

    /// Chunk, embed and index one document. Re-ingesting an id replaces it.
    pub async fn ingest(&self, document: Document) -> Result<DocumentId> {
        let id = self.ingest_unsaved(document).await?;
        self.autosave().await;
        Ok(id)
    }

    pub async fn ingest_many(&self, documents: Vec<Document>) -> Vec<(DocumentId, Result<DocumentId>)> {
        self.ingest_many_with(documents, |_, _| {}).await
    }

    /// Ingest independent documents concurrently; `progress` sees each result as it lands.
    /// Results are returned in input order and the snapshot is written once at the end.
    pub async fn ingest_many_with<F>(&self, documents: Vec<Document>, progress: F) -> Vec<(DocumentId, Result<DocumentId>)>
    where
        F: Fn(&str, &Result<DocumentId>),
    {
        let results: Vec<(DocumentId, Result<DocumentId>)> = stream::iter(documents)
            .map(|doc| async move {
                let id = doc.id.clone();
                (id, self.ingest_unsaved(doc).await)
            })
            .buffered(INGEST_CONCURRENCY)
            .inspect(|(id, result)| progress(id, result))
            .collect()
            .await;
        if results.iter().any(|(_, r)| r.is_ok()) {
            self.autosave().await;
        }
        results
    }

    async fn ingest_unsaved(&self, document: Document) -> Result<DocumentId> {
        if document.id.trim().is_empty() {
            return Err(Error::ingest(&document.id, "document id must not be empty"));
        }
        if document.is_blank() {
            return Err(Error::ingest(&document.id, "document has no extractable text"));
        }
        let chunks = self.chunker.chunk(&document);
        if chunks.is_empty() {
            return Err(Error::ingest(&document.id, "document produced no chunks"));
        }

        let dense = Arc::clone(&self.dense);
        let to_embed = chunks.clone();
        let prepared = tokio::task::spawn_blocking(move || dense.prepare(&to_embed))
            .await
            .map_err(|e| Error::ingest(&document.id, format!("embedding task failed: {e}")))??;

        let record = DocumentRecord::describe(&document, chunks.len());
        let chunk_count = chunks.len();
        {
            let _visible = self.gate.write().await;
            self.sparse.upsert_document(&document.id, &chunks);
            self.dense.commit_document(&document.id, prepared);
            self.store_mut().insert(record, chunks);
        }
        tracing::info!(document = %document.id, pages = document.pages.len(), chunks = chunk_count, "document ingested");
        Ok(document.id)
    }

    /// Retrieve, fuse and answer with citations.
    pub async fn ask(&self, query: &str, options: QueryOptions) -> Result<Answer> {
        let sources = self.retrieve(query, &options).await?;
        self.synthesizer.answer(query, sources).await
    }

    /// Fused ranking only; the language model is not called.
    pub async fn search(&self, query: &str, options: QueryOptions) -> Result<Vec<Source>> {
        self.retrieve(query, &options).await
    }

    /// Remove a document together with all of its chunks, vectors and postings.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        {
            let _visible = self.gate.write().await;
            let removed = self.store_mut().remove(document_id);
            if removed.is_none() {
                return Err(Error::NotFound(format!("document '{document_id}'")));
            }
            let vectors = self.dense.remove(document_id);
            let postings = self.sparse.remove(document_id);
            tracing::info!(document = %document_id, vectors, postings, "document deleted");
        }
        self.autosave().await;
        Ok(())
    }

    pub fn list_documents(&self) -> Vec<DocumentRecord> {
        self.store().documents().cloned().collect()
    }

    pub async fn summarize_document(&self, document_id: &str) -> Result<DocumentSummary> {
        let (record, content) = {
            let _visible = self.gate.read().await;
            let store = self.store();
            let record = store.document(document_id).cloned().ok_or_else(|| Error::NotFound(format!("document '{document_id}'")))?;
            let content = reassemble(&store.document_chunks(document_id));
            (record, content)
        };
        let summary = self.synthesizer.summarize(&record.title, &content).await?;
        Ok(DocumentSummary { document_id: record.id, title: record.title, summary })
    }

    pub fn status(&self) -> EngineStatus {
        let store = self.store();
        EngineStatus {
            documents: store.document_count(),
            chunks: store.chunk_count(),
            embedder_id: self.dense.embedder_id().to_string(),
            dimension: self.dense.dimension(),
            model: self.synthesizer.model_name().to_string(),
            snapshot_path: self.snapshot_path.clone(),
        }
    }

    /// Write the current state to the configured snapshot path.
    pub async fn save_snapshot(&self) -> Result<()> {
        let Some(path) = self.snapshot_path.clone() else {
            return Err(Error::Configuration("storage.snapshot_path is not set".into()));
        };
        let snapshot = {
            let _visible = self.gate.read().await;
            self.capture()
        };
        tokio::task::spawn_blocking(move || snapshot::write_atomic(&path, &snapshot))
            .await
            .map_err(|e| Error::Index(format!("snapshot task failed: {e}")))?
    }

    async fn autosave(&self) {
        if !self.autosave_enabled || self.snapshot_path.is_none() {
            return;
        }
        if let Err(e) = self.save_snapshot().await {
            tracing::warn!(error = %e, "autosave failed; in-memory index is unaffected");
        }
    }

    fn capture(&self) -> Snapshot {
        let store = self.store();
        Snapshot {
            format_version: FORMAT_VERSION,
            created_at: chrono::Utc::now(),
            embedder_id: self.dense.embedder_id().to_string(),
            dimension: self.dense.dimension(),
            documents: store.documents().cloned().collect(),
            chunks: store.chunks().cloned().collect(),
            dense: self.dense.snapshot(),
            sparse: self.sparse.snapshot(),
        }
    }

    fn check_query(&self, query: &str, options: &QueryOptions) -> Result<()> {
        if query.trim().is_empty() {
            return Err(Error::Query("query text must not be empty".into()));
        }
        let max_k = self.settings.retrieval.max_k;
        if options.k == 0 || options.k > max_k {
            return Err(Error::Query(format!("k must be within 1..={max_k}, got {}", options.k)));
        }
        validate_weights(options.dense_weight, options.sparse_weight).map_err(Error::Query)
    }

    async fn retrieve(&self, query: &str, options: &QueryOptions) -> Result<Vec<Source>> {
        self.check_query(query, options)?;
        let retrieval = &self.settings.retrieval;
        let candidates = options.k.saturating_mul(retrieval.candidate_multiplier);
        let timeout = Duration::from_millis(retrieval.strategy_timeout_ms);

        let _visible = self.gate.read().await;
        let dense = Arc::clone(&self.dense);
        let q = query.to_string();
        let dense_task = tokio::task::spawn_blocking(move || dense.search(&q, candidates));
        let sparse = Arc::clone(&self.sparse);
        let q = query.to_string();
        let sparse_task = tokio::task::spawn_blocking(move || sparse.search(&q, candidates));
        let (dense_hits, sparse_hits) = tokio::join!(
            collect_strategy("dense", dense_task, timeout),
            collect_strategy("sparse", sparse_task, timeout),
        );

        let fused = fuse(&dense_hits, &sparse_hits, options.dense_weight, options.sparse_weight, options.k, retrieval.normalization)?;
        tracing::debug!(dense = dense_hits.len(), sparse = sparse_hits.len(), fused = fused.len(), "retrieval");

        let store = self.store();
        let mut sources = Vec::with_capacity(fused.len());
        for hit in fused {
            let Some(chunk) = store.chunk(&hit.chunk_id) else {
                tracing::warn!(chunk = %hit.chunk_id, "ranked chunk missing from store");
                continue;
            };
            let Some(doc) = store.document(&chunk.document_id) else { continue };
            sources.push(Source {
                marker: sources.len() + 1,
                score: hit.score,
                filename: doc.filename.clone(),
                title: doc.title.clone(),
                chunk: chunk.clone(),
            });
        }
        Ok(sources)
    }

    fn store(&self) -> RwLockReadGuard<'_, ChunkStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_mut(&self) -> RwLockWriteGuard<'_, ChunkStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A failed or timed-out strategy contributes an empty list instead of failing the query.
async fn collect_strategy(name: &'static str, task: JoinHandle<Result<Vec<RetrievalResult>>>, timeout: Duration) -> Vec<RetrievalResult> {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(hits))) => hits,
        Ok(Ok(Err(e))) => {
            tracing::warn!(strategy = name, error = %e, "search failed; strategy contributes no results");
            Vec::new()
        }
        Ok(Err(e)) => {
            tracing::warn!(strategy = name, error = %e, "search task aborted");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(strategy = name, timeout_ms = timeout.as_millis() as u64, "search timed out; strategy contributes no results");
            Vec::new()
        }
    }
}

fn restore(path: &Path, embedder: &Arc<dyn Embedder>, params: Bm25Params) -> Result<Option<(ChunkStore, DenseIndex, SparseIndex)>> {
    let Some(snap) = snapshot::read(path)? else {
        return Ok(None);
    };
    let dense = DenseIndex::from_snapshot(Arc::clone(embedder), snap.dense)?;
    let sparse = SparseIndex::from_snapshot(params, snap.sparse)?;
    let store = ChunkStore::from_parts(snap.documents, snap.chunks);
    tracing::info!(path = %path.display(), documents = store.document_count(), chunks = store.chunk_count(), "snapshot restored");
    Ok(Some((store, dense, sparse)))
}
