//! Language-model backends behind `pdfqa_core::traits::LanguageModel`.
//!
//! Both talk plain HTTP through `reqwest`; the backend is chosen from
//! `LlmConfig` once, at construction.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

use pdfqa_core::config::{LlmBackend, LlmConfig};
use pdfqa_core::error::{Error, GenerationError, Result};
use pdfqa_core::traits::LanguageModel;

pub mod ollama;
pub mod openai;

pub use ollama::OllamaModel;
pub use openai::OpenAiModel;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

pub fn build_language_model(cfg: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
	let timeout = Duration::from_secs(cfg.timeout_secs);
	let client = reqwest::Client::builder()
		.timeout(timeout)
		.build()
		.map_err(|e| Error::Configuration(format!("http client: {e}")))?;
	match cfg.backend {
		LlmBackend::Ollama => {
			let base_url = cfg.base_url.clone().unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
			tracing::info!(%base_url, model = %cfg.model, "using Ollama backend");
			Ok(Arc::new(OllamaModel::new(client, base_url, cfg.model.clone(), timeout)))
		}
		LlmBackend::OpenAi => {
			let api_key = cfg
				.api_key
				.clone()
				.or_else(|| std::env::var("OPENAI_API_KEY").ok())
				.filter(|k| !k.trim().is_empty())
				.ok_or_else(|| Error::Configuration("llm.api_key (or OPENAI_API_KEY) is required for the openai backend".into()))?;
			let base_url = cfg.base_url.clone().unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
			tracing::info!(%base_url, model = %cfg.model, "using OpenAI-compatible backend");
			Ok(Arc::new(OpenAiModel::new(client, base_url, api_key, cfg.model.clone(), timeout)))
		}
	}
}

/// Map a non-success HTTP status onto a generation failure.
pub fn classify_status(status: StatusCode, body: &str) -> GenerationError {
	let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
	match status.as_u16() {
		429 => GenerationError::QuotaExhausted(detail),
		401 | 403 | 404 => GenerationError::Unavailable(detail),
		s if s >= 500 => GenerationError::Backend(detail),
		_ => GenerationError::Unavailable(detail),
	}
}

/// Transport errors: timeouts and connection failures are transient, decode errors are not.
pub fn classify_transport(err: &reqwest::Error, timeout: Duration) -> GenerationError {
	if err.is_timeout() {
		GenerationError::Timeout(timeout)
	} else if err.is_decode() {
		GenerationError::Malformed(err.to_string())
	} else {
		GenerationError::Backend(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_mapping() {
		assert!(matches!(classify_status(StatusCode::TOO_MANY_REQUESTS, ""), GenerationError::QuotaExhausted(_)));
		assert!(matches!(classify_status(StatusCode::BAD_GATEWAY, "oops"), GenerationError::Backend(_)));
		assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, ""), GenerationError::Unavailable(_)));
		assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
		assert!(!classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
	}
}
