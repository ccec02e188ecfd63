//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_LLM__MODEL`). Every section has
//! serde defaults, so a missing config file still yields a usable [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub server: ServerSettings,
    pub analysis: AnalysisSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.data.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("data.collection must not be empty".into()));
        }
        if self.index.embed_batch_size == 0 || self.index.insert_batch_size == 0 {
            return Err(Error::InvalidConfig("index batch sizes must be positive".into()));
        }
        let a = &self.analysis;
        if a.min_results == 0 || a.min_results > a.max_results {
            return Err(Error::InvalidConfig(format!(
                "analysis result range {}..={} is invalid",
                a.min_results, a.max_results
            )));
        }
        if !(a.min_results..=a.max_results).contains(&a.default_results) {
            return Err(Error::InvalidConfig(format!(
                "analysis.default_results {} outside {}..={}",
                a.default_results, a.min_results, a.max_results
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(Error::InvalidConfig("llm.max_tokens must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub reviews_csv: String,
    pub db_dir: String,
    pub collection: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            reviews_csv: "data/tinder_reviews_clean.csv".to_string(),
            db_dir: "tinder_rag_db_recent".to_string(),
            collection: "tinder_reviews_recent".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Keep only reviews newer than this many days; 0 keeps everything.
    pub recent_days: u32,
    /// Stratified sample size; 0 disables sampling.
    pub sample_size: usize,
    pub sample_seed: u64,
    pub embed_batch_size: usize,
    pub insert_batch_size: usize,
    pub description: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            recent_days: 365,
            sample_size: 0,
            sample_seed: 42,
            embed_batch_size: 64,
            insert_batch_size: 1000,
            description: "App reviews - Last 12 months only".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub max_len: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: "models/all-MiniLM-L6-v2".to_string(), max_len: 256, use_fake: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 2000,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl LlmSettings {
    /// Credential from the configured environment variable, if set and non-empty.
    pub fn api_key_from_env(&self) -> Option<String> {
        env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8501 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub default_results: usize,
    pub min_results: usize,
    pub max_results: usize,
    pub max_min_thumbs: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self { default_results: 15, min_results: 5, max_results: 30, max_min_thumbs: 100 }
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
