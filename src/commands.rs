use std::path::Path;

use tracing::{debug, info};

use crate::config::Config;
use crate::indexer::{IndexReport, Indexer};
use crate::providers::{Embedder, Generator};
use crate::rag::{RagAnswer, answer_with_citations};
use crate::structured::{StructuredOutput, structured_output};
use crate::vector_store::{SearchResult, VectorStore};
use crate::{RagError, Result};

/// Build a vector store from every text document under `documents_dir`
#[inline]
pub fn index<E: Embedder + ?Sized>(
    documents_dir: &Path,
    output_path: &Path,
    embedder: &E,
    settings: &Config,
) -> Result<IndexReport> {
    Indexer::new(embedder, settings.chunking, settings.indexing).index(documents_dir, output_path)
}

/// Embed `query` and return the `top_k` most similar chunks of the store at `store_path`
#[inline]
pub fn search_store<E: Embedder + ?Sized>(
    store_path: &Path,
    query: &str,
    top_k: usize,
    embedder: &E,
) -> Result<Vec<SearchResult>> {
    let store = VectorStore::load(store_path)?;
    debug!(
        "Loaded {} entries from {}",
        store.len(),
        store_path.display()
    );

    let query_embedding = embed_query(query, embedder)?;
    let results = store.search(&query_embedding, top_k)?;

    info!("Search returned {} results", results.len());
    Ok(results)
}

/// Retrieve context for `query` and answer it with inline citations
#[inline]
pub fn rag<P: Embedder + Generator + ?Sized>(
    store_path: &Path,
    query: &str,
    top_k: usize,
    provider: &P,
) -> Result<RagAnswer> {
    let chunks = search_store(store_path, query, top_k, provider)?;
    answer_with_citations(query, &chunks, provider)
}

/// Generate a schema-validated record, correcting the model up to `max_retries` times
#[inline]
pub fn structured<G: Generator + ?Sized>(
    prompt: &str,
    generator: &G,
    max_retries: u32,
) -> Result<StructuredOutput> {
    structured_output(generator, prompt, max_retries)
}

/// One free-text generation
#[inline]
pub fn generate<G: Generator + ?Sized>(prompt: &str, generator: &G) -> Result<String> {
    generator.generate(prompt)
}

/// Human-readable rendering of a RAG answer and its citations
#[inline]
pub fn format_rag_answer(answer: &RagAnswer) -> Result<String> {
    if answer.citations.is_empty() {
        return Ok(answer.answer.clone());
    }

    let citations = serde_json::to_string_pretty(&answer.citations)
        .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to render citations: {}", e)))?;
    Ok(format!("{}\n\nCitations:\n{}", answer.answer, citations))
}

fn embed_query<E: Embedder + ?Sized>(query: &str, embedder: &E) -> Result<Vec<f32>> {
    embedder
        .embed(&[query.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::Provider("No embedding returned for query".to_string()))
}
