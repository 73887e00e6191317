use std::fmt::Write;

use serde_json::{json, Value};

use pdfqa_core::error::GenerationError;
use pdfqa_core::types::Citation;
use pdfqa_hybrid::{Answer, DocumentRecord, EngineStatus, Source};

pub fn format_answer(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.text.trim());
    if !answer.citations.is_empty() {
        let _ = writeln!(out, "\nCitations:");
        for c in &answer.citations {
            let _ = writeln!(out, "  [{}] {} (page {})", c.marker, c.filename, c.page_number);
        }
    }
    if answer.unverified {
        let markers: Vec<String> = answer.unknown_markers.iter().map(|m| format!("[{m}]")).collect();
        let _ = writeln!(out, "\nWarning: the answer references {} which match no retrieved passage.", markers.join(", "));
    }
    out
}

/// Shown when retrieval worked but the model did not answer.
pub fn format_failed_answer(error: &GenerationError, sources: &[Citation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Answer generation failed: {error}");
    if sources.is_empty() {
        return out;
    }
    let _ = writeln!(out, "\nRetrieved passages:");
    for c in sources {
        let _ = writeln!(out, "  [{}] {} (page {})", c.marker, c.filename, c.page_number);
        let _ = writeln!(out, "      {}", c.excerpt.replace('\n', " "));
    }
    out
}

pub fn failed_answer_json(error: &GenerationError, sources: &[Citation]) -> Value {
    json!({ "error": error.to_string(), "transient": error.is_transient(), "sources": sources })
}

pub fn format_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return "No matching passages.\n".to_string();
    }
    let mut out = String::new();
    for s in sources {
        let preview: String = s.chunk.text.chars().take(160).collect::<String>().replace('\n', " ");
        let _ = writeln!(out, "{:>2}. [{:.3}] {} p.{} ({})", s.marker, s.score, s.title, s.chunk.page_number, s.chunk.chunk_id);
        let _ = writeln!(out, "    {preview}");
    }
    out
}

pub fn format_documents(docs: &[DocumentRecord]) -> String {
    if docs.is_empty() {
        return "No documents indexed.\n".to_string();
    }
    let mut out = String::new();
    for d in docs {
        let _ = writeln!(
            out,
            "{}\t{}\t{} pages\t{} chunks\tadded {}",
            d.id,
            d.title,
            d.page_count,
            d.chunk_count,
            d.added_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn format_status(status: &EngineStatus) -> String {
    let snapshot = status.snapshot_path.as_ref().map_or_else(|| "(in memory)".to_string(), |p| p.display().to_string());
    format!(
        "documents: {}\nchunks:    {}\nembedder:  {} ({} dims)\nmodel:     {}\nsnapshot:  {}\n",
        status.documents, status.chunks, status.embedder_id, status.dimension, status.model, snapshot
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(marker: usize, page: u32) -> Citation {
        Citation {
            marker,
            document_id: "bio".into(),
            filename: "biology.pdf".into(),
            page_number: page,
            chunk_id: format!("bio:{marker}"),
            excerpt: "Photosynthesis converts\nlight".into(),
        }
    }

    #[test]
    fn failed_answer_lists_retrieved_passages() {
        let error = GenerationError::QuotaExhausted("429".into());
        let text = format_failed_answer(&error, &[citation(1, 1), citation(2, 2)]);
        assert!(text.starts_with("Answer generation failed: backend quota exhausted: 429"));
        assert!(text.contains("[1] biology.pdf (page 1)"));
        assert!(text.contains("[2] biology.pdf (page 2)"));
        assert!(text.contains("Photosynthesis converts light"));

        let value = failed_answer_json(&error, &[citation(1, 1)]);
        assert_eq!(value["transient"], false);
        assert_eq!(value["sources"][0]["page_number"], 1);
        assert_eq!(value["sources"][0]["filename"], "biology.pdf");
    }

    #[test]
    fn failed_summary_has_no_passage_section() {
        let text = format_failed_answer(&GenerationError::Unavailable("down".into()), &[]);
        assert!(!text.contains("Retrieved passages"));
    }
}
