//! Hybrid retrieval and grounded answering over ingested documents.
//!
//! `QaEngine` ties the chunker, the dense and sparse indexes, score fusion and the
//! answer synthesizer together, and persists everything as one snapshot.

pub mod engine;
pub mod fusion;
pub mod snapshot;
pub mod store;
pub mod synthesizer;

pub use engine::{DocumentSummary, EngineStatus, QaEngine};
pub use fusion::fuse;
pub use store::DocumentRecord;
pub use synthesizer::{Answer, AnswerSynthesizer, Source, NO_INFORMATION_ANSWER};
