use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use pdfqa_core::types::{Document, Page};

/// Page separator written by `pdftotext`.
pub const FORM_FEED: char = '\u{c}';

/// Every `.txt` / `.json` file under `paths`, sorted; directories are walked recursively.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            if !is_supported(path) {
                bail!("unsupported file type: {}", path.display());
            }
            files.push(path.clone());
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("txt") | Some("json"))
}

/// Load one extracted document. JSON files hold a serialized `Document`; text files hold
/// page texts separated by form feeds and are identified by their file stem.
pub fn load_document(path: &Path) -> Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        return serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()));
    }
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
    let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
    Ok(Document { id, filename, title: None, pages: split_pages(&raw) })
}

/// Split on form feeds; trailing empty pages (the final `\f`) are dropped.
pub fn split_pages(raw: &str) -> Vec<Page> {
    let mut texts: Vec<&str> = raw.split(FORM_FEED).collect();
    while texts.last().is_some_and(|t| t.trim().is_empty()) {
        texts.pop();
    }
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page { page_number: i as u32 + 1, text: text.to_string() })
        .collect()
}
