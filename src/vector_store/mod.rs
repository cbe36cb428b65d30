// Vector store module
// Flat, whole-snapshot collection of embeddings with exact cosine search

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{RagError, Result};

/// A persisted chunk with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Dense zero-based id assigned in chunk-emission order
    pub id: u64,
    /// Provenance label, usually the originating file name
    pub source: String,
    /// Normalized chunk text
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: u64,
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Immutable snapshot of every entry in a store
///
/// A store is built whole, loaded whole and saved whole. There is no API to add
/// or remove single entries, and loading never merges into an existing store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorStore {
    entries: Vec<StoreEntry>,
}

impl VectorStore {
    /// Build a snapshot, rejecting entries whose embedding length disagrees with the first entry
    ///
    /// Embeddings holding NaN or infinite values are rejected as well.
    #[inline]
    pub fn new(entries: Vec<StoreEntry>) -> Result<Self> {
        if let Some(first) = entries.first() {
            let expected = first.embedding.len();
            if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: bad.embedding.len(),
                });
            }
        }
        if let Some(bad) = entries.iter().find(|e| !is_finite(&e.embedding)) {
            return Err(RagError::Store(format!(
                "entry {} from {} has a non-finite embedding value",
                bad.id, bad.source
            )));
        }

        Ok(Self { entries })
    }

    /// Load a snapshot from disk, replacing nothing and merging nothing
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(load_store(path)?)
    }

    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_store(path, &self.entries)
    }

    #[inline]
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        search(&self.entries, query_embedding, top_k)
    }

    #[inline]
    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding length shared by every entry, if the store is not empty
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }
}

fn is_finite(embedding: &[f32]) -> bool {
    embedding.iter().all(|v| v.is_finite())
}

/// Cosine similarity of two vectors
///
/// Vectors of different lengths are an error. A zero-norm vector scores 0.0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32;
    Ok(score)
}

/// Exact nearest-neighbour search over every entry
///
/// Results are ordered by descending score; equal scores keep their store order.
/// A single entry with the wrong dimension aborts the whole search, as does a
/// query embedding holding NaN or infinite values.
#[inline]
pub fn search(
    entries: &[StoreEntry],
    query_embedding: &[f32],
    top_k: usize,
) -> Result<Vec<SearchResult>> {
    if !is_finite(query_embedding) {
        return Err(RagError::Store(
            "query embedding has a non-finite value".to_string(),
        ));
    }

    let mut scored = entries
        .iter()
        .map(|entry| {
            let score = cosine_similarity(query_embedding, &entry.embedding)?;
            Ok(SearchResult {
                id: entry.id,
                source: entry.source.clone(),
                text: entry.text.clone(),
                score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);

    debug!(
        "Scored {} entries, returning top {}",
        entries.len(),
        scored.len()
    );
    Ok(scored)
}

/// Read a persisted snapshot
#[inline]
pub fn load_store<P: AsRef<Path>>(path: P) -> Result<Vec<StoreEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RagError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let entries: Vec<StoreEntry> = serde_json::from_str(&content).map_err(|e| {
        RagError::Store(format!(
            "Failed to parse vector store {}: {}",
            path.display(),
            e
        ))
    })?;

    info!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Write the complete snapshot, replacing whatever was at `path`
///
/// The snapshot goes to a sibling temporary file first and is renamed into place,
/// so a failure part way through leaves the previous store untouched.
#[inline]
pub fn save_store<P: AsRef<Path>>(path: P, entries: &[StoreEntry]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(entries)
        .map_err(|e| RagError::Store(format!("Failed to serialize vector store: {}", e)))?;

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    info!("Saved {} entries to {}", entries.len(), path.display());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
