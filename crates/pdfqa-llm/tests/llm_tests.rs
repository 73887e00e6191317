use pdfqa_core::config::{LlmBackend, LlmConfig};
use pdfqa_core::error::{Error, GenerationError};
use pdfqa_core::traits::LanguageModel;
use pdfqa_llm::ollama::parse_generate_response;
use pdfqa_llm::openai::parse_chat_response;
use pdfqa_llm::build_language_model;

#[test]
fn ollama_body_parsing() {
	assert_eq!(parse_generate_response(r#"{"model":"mistral","response":"Plants store energy [1]","done":true}"#).unwrap(), "Plants store energy [1]");
	assert!(matches!(parse_generate_response(r#"{"error":"model 'x' not found"}"#), Err(GenerationError::Backend(_))));
	assert!(matches!(parse_generate_response("not json"), Err(GenerationError::Malformed(_))));
	assert!(matches!(parse_generate_response(r#"{"done":true}"#), Err(GenerationError::Malformed(_))));
}

#[test]
fn chat_body_parsing() {
	let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#;
	assert_eq!(parse_chat_response(body).unwrap(), "hello");
	assert!(matches!(parse_chat_response(r#"{"choices":[]}"#), Err(GenerationError::Malformed(_))));
}

#[test]
fn openai_backend_needs_a_key() {
	std::env::remove_var("OPENAI_API_KEY");
	let cfg = LlmConfig { backend: LlmBackend::OpenAi, api_key: None, ..LlmConfig::default() };
	assert!(matches!(build_language_model(&cfg), Err(Error::Configuration(_))));

	let cfg = LlmConfig { backend: LlmBackend::OpenAi, api_key: Some("sk-test".into()), model: "gpt-4".into(), ..LlmConfig::default() };
	assert_eq!(build_language_model(&cfg).unwrap().name(), "gpt-4");
}

#[tokio::test]
async fn unreachable_ollama_is_a_transient_failure() {
	let cfg = LlmConfig { base_url: Some("http://127.0.0.1:9".into()), timeout_secs: 2, ..LlmConfig::default() };
	let model = build_language_model(&cfg).unwrap();
	let err = model.generate("hi", 8, 0.0).await.unwrap_err();
	assert!(err.is_transient(), "got {err:?}");
}
