//! Layered configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__K=8`).
//! Every section validates itself before any component is built from it.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::QueryOptions;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load with config files resolved against `dir`. Relative paths inside the
    /// settings (`storage.snapshot_path`, `embedding.model_dir`) resolve against it too.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.embedding.validate()?;
        self.llm.validate()
    }

    /// Anchor relative file locations at `base` (the configuration directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &String| resolve_with_base(base, p).to_string_lossy().into_owned();
        self.storage.snapshot_path = self.storage.snapshot_path.as_ref().map(resolve);
        self.embedding.model_dir = self.embedding.model_dir.as_ref().map(resolve);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks of the same page.
    pub chunk_overlap: usize,
    /// Boundary markers in priority order; a plain character cut is the last resort.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: vec!["\n\n".into(), "\n".into(), ". ".into(), " ".into()],
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.iter().any(String::is_empty) {
            return Err(Error::Configuration("separators must not be empty strings".into()));
        }
        Ok(())
    }
}

/// How each strategy's scores are mapped onto [0, 1] before fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    /// Divide by the list maximum.
    #[default]
    Max,
    /// `(s - min) / (max - min)`; a list of equal scores maps to 1.
    MinMax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
    pub max_k: usize,
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub candidate_multiplier: usize,
    pub strategy_timeout_ms: u64,
    pub normalization: ScoreNormalization,
    pub bm25_k1: f32,
    pub bm25_b: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            max_k: 100,
            dense_weight: 0.7,
            sparse_weight: 0.3,
            candidate_multiplier: 2,
            strategy_timeout_ms: 2000,
            normalization: ScoreNormalization::Max,
            bm25_k1: 1.5,
            bm25_b: 0.75,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.max_k == 0 || self.k > self.max_k {
            return Err(Error::Configuration(format!("k ({}) must be within 1..={}", self.k, self.max_k)));
        }
        if self.candidate_multiplier == 0 {
            return Err(Error::Configuration("candidate_multiplier must be >= 1".into()));
        }
        validate_weights(self.dense_weight, self.sparse_weight).map_err(Error::Configuration)?;
        if !(self.bm25_k1.is_finite() && self.bm25_k1 >= 0.0) || !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(Error::Configuration("bm25_k1 must be >= 0 and bm25_b within [0, 1]".into()));
        }
        Ok(())
    }

    pub fn default_options(&self) -> QueryOptions {
        QueryOptions { k: self.k, dense_weight: self.dense_weight, sparse_weight: self.sparse_weight }
    }
}

/// Both weights finite and non-negative, not both zero.
pub fn validate_weights(dense: f32, sparse: f32) -> std::result::Result<(), String> {
    if !dense.is_finite() || !sparse.is_finite() || dense < 0.0 || sparse < 0.0 {
        return Err(format!("weights must be finite and >= 0 (dense={dense}, sparse={sparse})"));
    }
    if dense == 0.0 && sparse == 0.0 {
        return Err("dense_weight and sparse_weight must not both be 0".into());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing; no model weights required.
    #[default]
    Hash,
    /// BGE-M3 through candle, weights loaded from `model_dir`.
    BgeM3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub dimension: usize,
    pub model_dir: Option<String>,
    pub max_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { backend: EmbeddingBackend::Hash, dimension: 1024, model_dir: None, max_len: 256 }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Configuration("embedding dimension must be > 0".into()));
        }
        if self.max_len == 0 {
            return Err(Error::Configuration("embedding max_len must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackend {
    #[default]
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Ollama,
            model: "mistral".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 120,
            retry_backoff_ms: 500,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::Configuration("llm max_tokens must be > 0".into()));
        }
        if !(self.temperature.is_finite() && (0.0..=2.0).contains(&self.temperature)) {
            return Err(Error::Configuration(format!("llm temperature {} outside [0, 2]", self.temperature)));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Configuration("llm timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file; `None` keeps the engine purely in memory.
    pub snapshot_path: Option<String>,
    /// Write a snapshot after every ingest/delete.
    pub autosave: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { snapshot_path: Some("data/index.snapshot.json".to_string()), autosave: true }
    }
}

impl StorageConfig {
    pub fn resolved_snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path.as_deref().map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
