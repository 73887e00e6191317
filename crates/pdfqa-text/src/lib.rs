//! pdfqa-text
//!
//! Sparse (lexical) retrieval: an in-memory inverted index scored with BM25.
//! Text normalization reuses tantivy's analyzer pipeline (simple tokenizer,
//! lower-casing, stop-word removal).

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::{InvertedIndex, SparseIndex};
pub use search::Bm25Params;
