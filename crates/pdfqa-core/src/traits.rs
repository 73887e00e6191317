use async_trait::async_trait;

use crate::error::GenerationError;

/// Maps text to a fixed-dimension vector.
///
/// Implementations must be deterministic for identical text and model version;
/// `id` names the model version so indexes can refuse vectors from another model.
pub trait Embedder: Send + Sync {
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// A text generation backend, local or remote.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, GenerationError>;
}
