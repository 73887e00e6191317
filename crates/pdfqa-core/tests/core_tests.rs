use std::fs;

use proptest::prelude::*;
use tempfile::TempDir;

use pdfqa_core::config::{ChunkingConfig, Config, EmbeddingBackend, ScoreNormalization, Settings};
use pdfqa_core::types::{Document, Page};
use pdfqa_core::{Chunker, Error};

#[test]
fn settings_default_when_no_files() {
    let tmp = TempDir::new().unwrap();
    let settings = Config::load_from(tmp.path(), "test").unwrap().settings().expect("defaults are valid");
    assert_eq!(settings.chunking, Settings::default().chunking);
    assert_eq!(settings.retrieval, Settings::default().retrieval);
    assert_eq!(settings.chunking.chunk_size, 1000);
    assert_eq!(settings.chunking.chunk_overlap, 200);
    assert_eq!(settings.retrieval.k, 5);
}

#[test]
fn env_file_overrides_base_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[retrieval]\nk = 7\nnormalization = \"min_max\"\n[embedding]\nbackend = \"bge_m3\"\n",
    )
    .unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[retrieval]\nk = 9\n").unwrap();

    let config = Config::load_from(tmp.path(), "test").unwrap();
    let settings = config.settings().unwrap();
    assert_eq!(settings.retrieval.k, 9);
    assert_eq!(settings.retrieval.normalization, ScoreNormalization::MinMax);
    assert_eq!(settings.embedding.backend, EmbeddingBackend::BgeM3);
    assert_eq!(config.get::<usize>("retrieval.k").unwrap(), 9);
}

#[test]
fn relative_paths_resolve_against_config_dir() {
    let tmp = TempDir::new().unwrap();
    let abs = tmp.path().join("elsewhere").join("weights");
    fs::write(
        tmp.path().join("config.toml"),
        format!("[storage]\nsnapshot_path = \"state/index.json\"\n[embedding]\nmodel_dir = {:?}\n", abs.to_string_lossy()),
    )
    .unwrap();
    let settings = Config::load_from(tmp.path(), "test").unwrap().settings().unwrap();
    assert_eq!(settings.storage.resolved_snapshot_path(), Some(tmp.path().join("state/index.json")));
    assert_eq!(settings.embedding.model_dir.as_deref(), Some(abs.to_string_lossy().as_ref()));

    let bare = TempDir::new().unwrap();
    let defaults = Config::load_from(bare.path(), "test").unwrap().settings().unwrap();
    assert_eq!(defaults.storage.resolved_snapshot_path(), Some(bare.path().join("data/index.snapshot.json")));
}

#[test]
fn invalid_overlap_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();
    let err = Config::load_from(tmp.path(), "prod").unwrap().settings().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
}

#[test]
fn both_weights_zero_is_rejected() {
    let mut settings = Settings::default();
    settings.retrieval.dense_weight = 0.0;
    settings.retrieval.sparse_weight = 0.0;
    assert!(matches!(settings.validate(), Err(Error::Configuration(_))));

    settings.retrieval.dense_weight = -0.5;
    settings.retrieval.sparse_weight = 1.0;
    assert!(matches!(settings.validate(), Err(Error::Configuration(_))));
}

fn single_page(text: String) -> Document {
    Document { id: "p".into(), filename: "p.pdf".into(), title: None, pages: vec![Page { page_number: 1, text }] }
}

proptest! {
    #[test]
    fn chunking_is_deterministic(text in "[a-z .\n]{0,400}", size in 5usize..80, overlap_frac in 0.0f64..0.9) {
        let overlap = ((size as f64) * overlap_frac) as usize;
        let chunker = Chunker::new(ChunkingConfig { chunk_size: size, chunk_overlap: overlap, ..ChunkingConfig::default() }).unwrap();
        let doc = single_page(text);
        prop_assert_eq!(chunker.chunk(&doc), chunker.chunk(&doc));
    }

    #[test]
    fn adjacent_chunks_overlap_by_configured_amount(text in "[a-z .\n]{1,400}", size in 5usize..80, overlap_frac in 0.0f64..0.9) {
        let overlap = ((size as f64) * overlap_frac) as usize;
        let chunker = Chunker::new(ChunkingConfig { chunk_size: size, chunk_overlap: overlap, ..ChunkingConfig::default() }).unwrap();
        let chunks = chunker.chunk(&single_page(text));
        for c in &chunks {
            prop_assert!(c.text.chars().count() <= size);
            prop_assert!(c.overlap_with_previous < c.char_len());
        }
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[1].overlap_with_previous, overlap);
            prop_assert!(pair[1].start_offset >= pair[0].start_offset);
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            prop_assert_eq!(&prev[prev.len() - overlap..], &next[..overlap]);
        }
    }
}
