//! `coverwise.toml`: every section and key is optional; missing values fall back to the
//! defaults below. `COVERWISE_OLLAMA_URL` overrides `[ollama] base_url`.

use std::fs;
use std::path::{Path, PathBuf};

use cover_core::domain::Country;
use cover_core::error::AppError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "coverwise.toml";
pub const OLLAMA_URL_ENV: &str = "COVERWISE_OLLAMA_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub ollama: OllamaConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub graph_db: PathBuf,
    pub vector_dir: PathBuf,
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embed_model: String,
    pub llm_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k_vector: usize,
    pub k_graph: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    /// Countries whose full set of policy models must load at startup.
    pub countries: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            graph_db: PathBuf::from("data/graph.sqlite"),
            vector_dir: PathBuf::from("data/vectors"),
            models_dir: PathBuf::from("models"),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            llm_model: "llama3.1:8b".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_vector: 6,
            k_graph: 6,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            countries: vec!["india".to_string()],
        }
    }
}

impl Config {
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_FILE_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_toml(&contents).map_err(|e| {
            let details = format!(
                "path={}; {}",
                path.display(),
                e.details.clone().unwrap_or_default()
            );
            e.with_details(details)
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, AppError> {
        toml::from_str(contents).map_err(|e| {
            AppError::new("CONFIG_FILE_INVALID", "Failed to parse config file")
                .with_details(e.to_string())
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(OLLAMA_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.ollama.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.ingest.batch_size == 0 {
            return Err(AppError::new("CONFIG_INVALID", "ingest.batch_size must be at least 1"));
        }
        if self.retrieval.k_vector + self.retrieval.k_graph == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "retrieval.k_vector and retrieval.k_graph cannot both be 0",
            ));
        }
        if self.ollama.embed_model.trim().is_empty() || self.ollama.llm_model.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "ollama model names must not be empty"));
        }
        self.countries()?;
        Ok(())
    }

    pub fn countries(&self) -> Result<Vec<Country>, AppError> {
        self.models
            .countries
            .iter()
            .map(|c| {
                c.parse::<Country>().map_err(|e| {
                    AppError::new("CONFIG_INVALID", "models.countries has an unknown country")
                        .with_details(e.details.unwrap_or_default())
                })
            })
            .collect()
    }
}
