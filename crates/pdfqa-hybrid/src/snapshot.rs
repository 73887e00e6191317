//! Versioned JSON snapshot of the whole engine state.
//!
//! Writes go to a temp file in the target directory which is then renamed over the
//! old snapshot, so a crash never leaves a half-written file behind. Loading checks
//! the version and cross-references chunks, vectors and postings before anything
//! is applied.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use pdfqa_core::error::{Error, Result};
use pdfqa_core::types::Chunk;
use pdfqa_text::InvertedIndex;
use pdfqa_vector::DenseSnapshot;

use crate::store::DocumentRecord;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub embedder_id: String,
    pub dimension: usize,
    pub documents: Vec<DocumentRecord>,
    pub chunks: Vec<Chunk>,
    pub dense: DenseSnapshot,
    pub sparse: InvertedIndex,
}

impl Snapshot {
    /// Structural checks; the indexes run their own on restore.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(Error::Index(format!("unsupported snapshot format {} (expected {})", self.format_version, FORMAT_VERSION)));
        }
        if self.dense.embedder_id != self.embedder_id || self.dense.dimension != self.dimension {
            return Err(Error::Index("dense section disagrees with snapshot header".into()));
        }
        let docs: BTreeSet<&str> = self.documents.iter().map(|d| d.id.as_str()).collect();
        if docs.len() != self.documents.len() {
            return Err(Error::Index("duplicate document in snapshot catalogue".into()));
        }
        let mut chunk_ids = BTreeSet::new();
        for chunk in &self.chunks {
            if !docs.contains(chunk.document_id.as_str()) {
                return Err(Error::Index(format!("chunk {} belongs to unknown document {}", chunk.chunk_id, chunk.document_id)));
            }
            if !chunk_ids.insert(chunk.chunk_id.as_str()) {
                return Err(Error::Index(format!("duplicate chunk {}", chunk.chunk_id)));
            }
        }
        for doc in &self.documents {
            let n = self.chunks.iter().filter(|c| c.document_id == doc.id).count();
            if n != doc.chunk_count {
                return Err(Error::Index(format!("document {} lists {} chunks, snapshot holds {}", doc.id, doc.chunk_count, n)));
            }
        }
        let dense_ids: BTreeSet<&str> = self.dense.entries.iter().map(|e| e.chunk_id.as_str()).collect();
        let sparse_ids: BTreeSet<&str> = self.sparse.chunks.keys().map(String::as_str).collect();
        if dense_ids != chunk_ids || sparse_ids != chunk_ids {
            return Err(Error::Index("dense/sparse entries do not match the stored chunks".into()));
        }
        Ok(())
    }
}

/// Serialize `snapshot` to `path` atomically.
pub fn write_atomic(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::Index(format!("create {}: {e}", dir.display())))?;
    let tmp = NamedTempFile::new_in(dir).map_err(|e| Error::Index(format!("temp file in {}: {e}", dir.display())))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, snapshot).map_err(|e| Error::Index(format!("serialize snapshot: {e}")))?;
        writer.flush().map_err(|e| Error::Index(format!("write snapshot: {e}")))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::Index(format!("sync snapshot: {e}")))?;
    tmp.persist(path).map_err(|e| Error::Index(format!("replace {}: {}", path.display(), e.error)))?;
    tracing::info!(path = %path.display(), chunks = snapshot.chunks.len(), "snapshot written");
    Ok(())
}

/// `Ok(None)` when no snapshot exists yet; any other problem is an `IndexError`.
pub fn read(path: &Path) -> Result<Option<Snapshot>> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Index(format!("open {}: {e}", path.display()))),
    };
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Index(format!("parse {}: {e}", path.display())))?;
    snapshot.validate()?;
    Ok(Some(snapshot))
}

/// Move an unusable snapshot aside as `<name>.rejected-<UTC timestamp>` so later
/// writes cannot replace it. Returns the new location.
pub fn set_aside(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::Index(format!("snapshot path {} has no file name", path.display())))?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let target = path.with_file_name(format!("{}.rejected-{stamp}", name.to_string_lossy()));
    fs::rename(path, &target).map_err(|e| Error::Index(format!("move {} aside: {e}", path.display())))?;
    tracing::warn!(from = %path.display(), to = %target.display(), "unusable snapshot set aside");
    Ok(target)
}
