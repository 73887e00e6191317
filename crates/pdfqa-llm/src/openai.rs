use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use pdfqa_core::error::GenerationError;
use pdfqa_core::traits::LanguageModel;

use crate::{classify_status, classify_transport};

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiModel {
	client: Client,
	base_url: String,
	api_key: String,
	model: String,
	timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: Vec<ChatMessage<'a>>,
	temperature: f32,
	max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
	role: &'a str,
	content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	#[serde(default)]
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
	content: Option<String>,
}

impl OpenAiModel {
	pub fn new(client: Client, base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
		Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key, model, timeout }
	}
}

/// Content of the first choice of a chat completion body.
pub fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
	let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| GenerationError::Malformed(format!("chat response: {e}")))?;
	parsed
		.choices
		.into_iter()
		.next()
		.and_then(|c| c.message.content)
		.ok_or_else(|| GenerationError::Malformed("chat response has no choices".into()))
}

#[async_trait]
impl LanguageModel for OpenAiModel {
	fn name(&self) -> &str { &self.model }

	async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, GenerationError> {
		let url = format!("{}/chat/completions", self.base_url);
		let request = ChatRequest {
			model: &self.model,
			messages: vec![ChatMessage { role: "user", content: prompt }],
			temperature,
			max_tokens,
		};
		tracing::debug!(%url, model = %self.model, "chat completion");
		let response = self
			.client
			.post(&url)
			.header("Authorization", format!("Bearer {}", self.api_key))
			.json(&request)
			.send()
			.await
			.map_err(|e| classify_transport(&e, self.timeout))?;
		let status = response.status();
		let body = response.text().await.map_err(|e| classify_transport(&e, self.timeout))?;
		if !status.is_success() {
			tracing::warn!(%status, "chat completion rejected");
			return Err(classify_status(status, &body));
		}
		parse_chat_response(&body)
	}
}
