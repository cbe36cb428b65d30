// Indexer module
// Turns a directory of text documents into a persisted vector store


use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::ChunkingConfig;
use crate::providers::Embedder;
use crate::vector_store::{StoreEntry, VectorStore};
use crate::{RagError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// File extensions treated as indexable text, compared case-insensitively
pub const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// Configuration for index construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Number of chunks sent to the embedder per request
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// A chunk waiting for its embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub source: String,
    pub text: String,
}

/// Summary of a completed index build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub output_path: PathBuf,
}

/// Builds vector stores from documents using an embedding capability
pub struct Indexer<'a, E: Embedder + ?Sized> {
    embedder: &'a E,
    chunking: ChunkingConfig,
    indexing: IndexingConfig,
    show_progress: bool,
}

impl<'a, E: Embedder + ?Sized> Indexer<'a, E> {
    #[inline]
    pub fn new(embedder: &'a E, chunking: ChunkingConfig, indexing: IndexingConfig) -> Self {
        Self {
            embedder,
            chunking,
            indexing,
            show_progress: console::user_attended_stderr(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Chunk, embed and persist every text document under `documents_dir`
    ///
    /// The store is written only after every batch has been embedded.
    #[inline]
    pub fn index(&self, documents_dir: &Path, output_path: &Path) -> Result<IndexReport> {
        info!("Indexing documents in {}", documents_dir.display());

        let documents = collect_documents(documents_dir)?;
        let records = self.chunk_documents(&documents)?;

        if records.is_empty() {
            return Err(RagError::EmptyInput(format!(
                "No text files found to index in {}",
                documents_dir.display()
            )));
        }

        let store = self.build_store(&records)?;
        store.save(output_path)?;

        let report = IndexReport {
            documents: documents.len(),
            chunks: store.len(),
            dimension: store.dimension().unwrap_or(0),
            output_path: output_path.to_path_buf(),
        };
        info!(
            "Indexed {} chunks from {} documents into {}",
            report.chunks,
            report.documents,
            output_path.display()
        );
        Ok(report)
    }

    /// Read and chunk each document, labelling chunks with the file name
    #[inline]
    pub fn chunk_documents(&self, documents: &[PathBuf]) -> Result<Vec<ChunkRecord>> {
        let mut records = Vec::new();

        for path in documents {
            let bytes = fs::read(path)?;
            let text = String::from_utf8_lossy(&bytes);
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let chunks = self.chunking.chunk(&text);
            debug!("{} produced {} chunks", path.display(), chunks.len());

            records.extend(chunks.into_iter().map(|text| ChunkRecord {
                source: source.clone(),
                text,
            }));
        }

        Ok(records)
    }

    /// Embed records in order, batch by batch, assigning ids in emission order
    #[inline]
    pub fn build_store(&self, records: &[ChunkRecord]) -> Result<VectorStore> {
        let batch_size = self.indexing.batch_size.max(1);
        let bar = self.progress_bar(records.len().div_ceil(batch_size));

        let mut entries = Vec::with_capacity(records.len());
        for batch in records.chunks(batch_size) {
            let embeddings = self.embed_batch(batch, &bar)?;

            for (record, embedding) in batch.iter().zip(embeddings) {
                entries.push(StoreEntry {
                    id: entries.len() as u64,
                    source: record.source.clone(),
                    text: record.text.clone(),
                    embedding,
                });
            }

            bar.set_message(format!("{} chunks", entries.len()));
            bar.inc(1);
        }

        bar.finish_and_clear();
        VectorStore::new(entries)
    }

    /// Embed one batch; any failure abandons the progress bar before it is returned
    fn embed_batch(&self, batch: &[ChunkRecord], bar: &ProgressBar) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).map_err(|e| {
            bar.abandon();
            e
        })?;

        if embeddings.len() != batch.len() {
            bar.abandon();
            return Err(RagError::Provider(format!(
                "Mismatch between request and response counts: {} vs {}",
                batch.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    fn progress_bar(&self, batches: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        ProgressBar::new(batches as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                .expect("style template is valid"),
        )
    }
}

/// Whether a path has one of the indexable text extensions
#[inline]
pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}

/// Recursively list indexable files under `dir` in sorted path order
///
/// Symlinked directories are not descended into. Symlinks to regular files are kept.
#[inline]
pub fn collect_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::NotFound(dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                debug!("Skipping symlinked directory {}", path.display());
            } else if path.is_file() && is_text_file(&path) {
                documents.push(path);
            }
        }
    }

    documents.sort();
    debug!(
        "Found {} text documents under {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}
