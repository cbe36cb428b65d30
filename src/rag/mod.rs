// RAG answer module
// Grounded prompt construction and citation extraction


use std::collections::BTreeSet;
use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use crate::Result;
use crate::providers::Generator;
use crate::vector_store::SearchResult;

static CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]+?:\d+)\]").expect("citation pattern is valid")
});

const INSTRUCTIONS: &str = "Answer the question using only the context below. \
Cite sources in-line as [source:id]. If the answer is not in the context, say you do not know.";

/// An answer together with the citation markers it contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    /// Deduplicated `source:id` markers in sorted order
    pub citations: BTreeSet<String>,
}

/// Render retrieved chunks as tagged context followed by the answering instructions
#[inline]
pub fn build_prompt(query: &str, chunks: &[SearchResult]) -> String {
    let context = chunks
        .iter()
        .map(|chunk| format!("[{}:{}] {}", chunk.source, chunk.id, chunk.text))
        .join("\n\n");

    format!("{INSTRUCTIONS}\n\nContext:\n{context}\n\nQuestion: {query}\nAnswer:")
}

/// Collect every bracketed `source:integer` marker in the answer
///
/// Markers are not checked against the chunks that were supplied to the model.
#[inline]
pub fn extract_citations(answer: &str) -> BTreeSet<String> {
    let mut citations = BTreeSet::new();

    for capture in CITATION_PATTERN.captures_iter(answer) {
        match capture {
            Ok(capture) => {
                if let Some(marker) = capture.get(1) {
                    citations.insert(marker.as_str().to_string());
                }
            }
            Err(e) => {
                warn!("Stopped scanning for citations: {}", e);
                break;
            }
        }
    }

    citations
}

/// Ask the generator once and pull the citations out of its answer
#[inline]
pub fn answer_with_citations<G: Generator + ?Sized>(
    query: &str,
    chunks: &[SearchResult],
    generator: &G,
) -> Result<RagAnswer> {
    let prompt = build_prompt(query, chunks);
    debug!(
        "Answering with {} context chunks ({} prompt characters)",
        chunks.len(),
        prompt.len()
    );

    let answer = generator.generate(&prompt)?;
    let citations = extract_citations(&answer);

    debug!("Answer cites {} distinct sources", citations.len());
    Ok(RagAnswer { answer, citations })
}
