//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_RETRIEVAL__TOP_K=6`). Provides helpers to expand `~` and `${VAR}` and
//! to resolve relative paths against a known base directory.

use crate::error::{Error, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Loads configuration relative to the current working directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => {
                figment = figment.merge(Toml::file(base_dir.join("config.dev.toml")));
            }
            "prod" | "production" => {
                figment = figment.merge(Toml::file(base_dir.join("config.prod.toml")));
            }
            "test" | "testing" => {
                figment = figment.merge(Toml::file(base_dir.join("config.test.toml")));
            }
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: base_dir.to_path_buf() })
    }

    /// Extracts and validates the full settings tree. Relative paths are
    /// resolved against the directory the config was loaded from.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.paths = settings.paths.resolved(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    /// Department key → roles offered to users of that department.
    pub departments: BTreeMap<String, Vec<String>>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(Error::InvalidConfig("retrieval.chunk_size must be > 0".into()));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "retrieval.chunk_overlap ({}) must be smaller than chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        if r.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be > 0".into()));
        }
        if r.general_department.trim().is_empty() {
            return Err(Error::InvalidConfig("retrieval.general_department must not be empty".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be > 0".into()));
        }
        if self.embedding.provider == EmbeddingProvider::Local && self.embedding.dimension != BGE_M3_DIMENSION {
            return Err(Error::InvalidConfig(format!(
                "embedding.dimension must be {BGE_M3_DIMENSION} for the local BGE-M3 provider, got {}",
                self.embedding.dimension
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        let g = &self.generation;
        if !g.available_models.iter().any(|m| m == &g.default_model) {
            return Err(Error::InvalidConfig(format!(
                "generation.default_model '{}' is not listed in available_models",
                g.default_model
            )));
        }
        Ok(())
    }

    /// Roles configured for a department; empty when the department is unknown.
    pub fn roles_for(&self, department: &str) -> &[String] {
        self.departments.get(department).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Root holding one sub-folder of text files per department.
    pub upload_dir: PathBuf,
    /// Root holding one persisted index per department.
    pub vector_dir: PathBuf,
    /// JSON file holding the admin-selected generation model.
    pub model_config: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data"),
            vector_dir: PathBuf::from("vectorstore"),
            model_config: PathBuf::from("config.json"),
        }
    }
}

impl PathSettings {
    fn resolved(self, base: &Path) -> Self {
        Self {
            upload_dir: resolve_with_base(base, self.upload_dir.to_string_lossy()),
            vector_dir: resolve_with_base(base, self.vector_dir.to_string_lossy()),
            model_config: resolve_with_base(base, self.model_config.to_string_lossy()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Folder whose documents are shared by every department.
    pub general_department: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 100, top_k: 4, general_department: "general".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint.
    Remote,
    /// BGE-M3 running in-process via candle.
    Local,
    /// Deterministic hash embedder for tests and offline demos.
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    /// Name of the env var that holds the API key, never the key itself.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub model_dir: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Remote,
            model: "text-embedding-004".into(),
            dimension: 768,
            base_url: GEMINI_OPENAI_BASE_URL.into(),
            api_key_env: "GOOGLE_API_KEY".into(),
            timeout_secs: 30,
            batch_size: 64,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub default_model: String,
    pub available_models: Vec<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: GEMINI_OPENAI_BASE_URL.into(),
            api_key_env: "GOOGLE_API_KEY".into(),
            default_model: "gemini-2.5-flash".into(),
            available_models: vec![
                "gemini-2.5-flash".into(),
                "gemini-2.5-flash-lite".into(),
                "gemini-2.5-pro".into(),
            ],
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Hidden size of the BGE-M3 model used by the local provider.
pub const BGE_M3_DIMENSION: usize = 1024;

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
