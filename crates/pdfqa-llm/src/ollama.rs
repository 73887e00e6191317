use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use pdfqa_core::error::GenerationError;
use pdfqa_core::traits::LanguageModel;

use crate::{classify_status, classify_transport};

/// Local models served by Ollama (`POST /api/generate`, non-streaming).
pub struct OllamaModel {
	client: Client,
	base_url: String,
	model: String,
	timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
	model: &'a str,
	prompt: &'a str,
	stream: bool,
	options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
	temperature: f32,
	num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
	response: Option<String>,
	error: Option<String>,
}

impl OllamaModel {
	pub fn new(client: Client, base_url: String, model: String, timeout: Duration) -> Self {
		Self { client, base_url: base_url.trim_end_matches('/').to_string(), model, timeout }
	}
}

/// Extract the generated text from an `/api/generate` response body.
pub fn parse_generate_response(body: &str) -> Result<String, GenerationError> {
	let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| GenerationError::Malformed(format!("ollama response: {e}")))?;
	if let Some(err) = parsed.error {
		return Err(GenerationError::Backend(err));
	}
	parsed.response.ok_or_else(|| GenerationError::Malformed("ollama response has no 'response' field".into()))
}

#[async_trait]
impl LanguageModel for OllamaModel {
	fn name(&self) -> &str { &self.model }

	async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, GenerationError> {
		let url = format!("{}/api/generate", self.base_url);
		let request = GenerateRequest {
			model: &self.model,
			prompt,
			stream: false,
			options: GenerateOptions { temperature, num_predict: max_tokens },
		};
		tracing::debug!(%url, model = %self.model, prompt_chars = prompt.len(), "ollama generate");
		let response = self.client.post(&url).json(&request).send().await.map_err(|e| classify_transport(&e, self.timeout))?;
		let status = response.status();
		let body = response.text().await.map_err(|e| classify_transport(&e, self.timeout))?;
		if !status.is_success() {
			return Err(classify_status(status, &body));
		}
		parse_generate_response(&body)
	}
}
