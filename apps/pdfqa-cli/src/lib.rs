//! Document loading and output formatting for the `pdfqa` binary.

pub mod loader;
pub mod output;
