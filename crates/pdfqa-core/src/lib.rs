//! pdfqa-core
//!
//! Shared domain types, error kinds, backend capability traits, layered
//! configuration and the page-aware chunker.

pub mod chunker;
pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use chunker::Chunker;
pub use error::{Error, GenerationError, Result};
