//! Grounded prompt construction, language-model invocation and citation resolution.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use pdfqa_core::config::LlmConfig;
use pdfqa_core::error::{Error, GenerationError, Result};
use pdfqa_core::traits::LanguageModel;
use pdfqa_core::types::{Chunk, Citation};

pub const NO_INFORMATION_ANSWER: &str =
    "I don't have enough information to answer this question. No relevant passages were found in the indexed documents.";

const EXCERPT_CHARS: usize = 200;

/// Bracketed numbers more than this far past the highest supplied marker are
/// prose (years, figure numbers), not citations.
const MARKER_SLACK: usize = 10;

/// A retrieved chunk as handed to the synthesizer, tagged with its reference marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub marker: usize,
    pub score: f32,
    pub filename: String,
    pub title: String,
    pub chunk: Chunk,
}

impl Source {
    pub fn citation(&self) -> Citation {
        Citation {
            marker: self.marker,
            document_id: self.chunk.document_id.clone(),
            filename: self.filename.clone(),
            page_number: self.chunk.page_number,
            chunk_id: self.chunk.chunk_id.clone(),
            excerpt: excerpt(&self.chunk.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Citations for the markers the model actually used, in order of first use.
    pub citations: Vec<Citation>,
    /// Every passage the answer was grounded on, in fused rank order.
    pub sources: Vec<Source>,
    /// Set when the model referenced markers that were not in the context.
    pub unverified: bool,
    pub unknown_markers: Vec<usize>,
}

impl Answer {
    fn no_information() -> Self {
        Self { text: NO_INFORMATION_ANSWER.to_string(), citations: Vec::new(), sources: Vec::new(), unverified: false, unknown_markers: Vec::new() }
    }
}

pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    retry_backoff: Duration,
    markers: Regex,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, cfg: &LlmConfig) -> Result<Self> {
        let markers = Regex::new(r"\[\s*(\d+(?:\s*,\s*\d+)*)\s*\]").map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self {
            model,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout: Duration::from_secs(cfg.timeout_secs),
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
            markers,
        })
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Answer `query` from `sources` only. An empty context never reaches the model.
    pub async fn answer(&self, query: &str, sources: Vec<Source>) -> Result<Answer> {
        if sources.is_empty() {
            tracing::info!("no context retrieved; returning fixed answer");
            return Ok(Answer::no_information());
        }
        let prompt = build_answer_prompt(query, &sources);
        let text = match self.generate(&prompt).await {
            Ok(text) => text,
            Err(source) => return Err(Error::Generation { source, sources: sources.iter().map(Source::citation).collect() }),
        };

        let (citations, unknown) = self.resolve_markers(&text, &sources);
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "answer cites markers that are not in the context");
        }
        Ok(Answer { text, citations, sources, unverified: !unknown.is_empty(), unknown_markers: unknown })
    }

    /// Summarize a document body; `content` must not be blank.
    pub async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        if content.trim().is_empty() {
            return Err(Error::Query(format!("document '{title}' has no text to summarize")));
        }
        let prompt = build_summary_prompt(title, content);
        self.generate(&prompt).await.map_err(|source| Error::Generation { source, sources: Vec::new() })
    }

    /// One call, bounded by the timeout; transient failures get one more attempt after the backoff.
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        match self.attempt(prompt).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, backoff_ms = self.retry_backoff.as_millis() as u64, "transient generation failure, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                self.attempt(prompt).await
            }
            other => other,
        }
    }

    async fn attempt(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        match tokio::time::timeout(self.timeout, self.model.generate(prompt, self.max_tokens, self.temperature)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        }
    }

    /// Citations for known markers in order of first use, plus the markers matching no source.
    /// A bracket group holding 0 or a number past the plausible range is skipped whole.
    fn resolve_markers(&self, text: &str, sources: &[Source]) -> (Vec<Citation>, Vec<usize>) {
        let mut seen = BTreeSet::new();
        let mut citations = Vec::new();
        let mut unknown = Vec::new();
        let limit = sources.iter().map(|s| s.marker).max().unwrap_or(0) + MARKER_SLACK;
        for caps in self.markers.captures_iter(text) {
            let numbers: Vec<usize> = caps[1].split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if numbers.iter().any(|&n| n == 0 || n > limit) {
                continue;
            }
            for n in numbers {
                if !seen.insert(n) {
                    continue;
                }
                match sources.iter().find(|s| s.marker == n) {
                    Some(source) => citations.push(source.citation()),
                    None => unknown.push(n),
                }
            }
        }
        (citations, unknown)
    }
}

pub fn build_answer_prompt(query: &str, sources: &[Source]) -> String {
    let mut context = String::new();
    for s in sources {
        context.push_str(&format!("[{}] {} (page {})\n{}\n\n", s.marker, s.title, s.chunk.page_number, s.chunk.text));
    }
    format!(
        "You are a helpful research assistant. Answer the question using only the context below.\n\
         If the context does not contain the answer, say that you don't know; do not make up an answer.\n\
         Support every claim with the reference marker of its passage, for example [1] or [2].\n\n\
         Context:\n{context}\
         Question: {query}\n\n\
         Answer:"
    )
}

pub fn build_summary_prompt(title: &str, content: &str) -> String {
    format!(
        "You are a helpful research assistant. Please provide a concise summary of the following document.\n\
         Focus on the main topics, key findings and important concepts.\n\n\
         Document: {title}\n{content}\n\n\
         Summary:"
    )
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    out.push('…');
    out
}
