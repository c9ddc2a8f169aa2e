use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::{Country, PolicyType};
use crate::error::AppError;

use super::bundle::ModelBundle;

pub const MODEL_MISSING: &str = "CONFIG_MODEL_MISSING";

/// All model bundles, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    bundles: BTreeMap<(Country, PolicyType), ModelBundle>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bundle: ModelBundle) -> Result<(), AppError> {
        bundle.validate()?;
        self.bundles
            .insert((bundle.country, bundle.policy_type), bundle);
        Ok(())
    }

    /// Load every `<country>_<policy>/model.json` under `root`. Directories with other names
    /// are ignored; a recognised directory with a missing or broken artifact fails the load.
    pub fn load_dir(root: &Path) -> Result<Self, AppError> {
        let entries = fs::read_dir(root).map_err(|e| {
            AppError::new("CONFIG_MODELS_DIR_MISSING", "Failed to read models directory")
                .with_details(format!("path={}; err={}", root.display(), e))
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                AppError::new("CONFIG_MODELS_DIR_MISSING", "Failed to list models directory")
                    .with_details(format!("path={}; err={}", root.display(), e))
            })?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut registry = Self::new();
        for dir in dirs {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let Some(key) = parse_dir_key(&name) else {
                debug!(dir = %dir.display(), "skipping non-model directory");
                continue;
            };
            let bundle = ModelBundle::load(&dir)?;
            if (bundle.country, bundle.policy_type) != key {
                return Err(AppError::new(
                    "CONFIG_MODEL_INVALID",
                    "Model artifact declares a different country/policy than its directory",
                )
                .with_details(format!(
                    "dir={name}; declared={}_{}",
                    bundle.country.as_str(),
                    bundle.policy_type.as_str()
                )));
            }
            registry.insert(bundle)?;
        }

        info!(root = %root.display(), bundles = registry.len(), "model registry loaded");
        Ok(registry)
    }

    /// Fail unless every policy type has a bundle for each of `countries`.
    pub fn require(&self, countries: &[Country]) -> Result<(), AppError> {
        let missing: Vec<String> = countries
            .iter()
            .flat_map(|c| PolicyType::ALL.iter().map(move |p| (*c, *p)))
            .filter(|key| !self.bundles.contains_key(key))
            .map(|(c, p)| format!("{}_{}", c.as_str(), p.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(
                AppError::new(MODEL_MISSING, "Required model artifacts are missing")
                    .with_details(format!("missing={}", missing.join(","))),
            );
        }
        Ok(())
    }

    pub fn get(&self, country: Country, policy_type: PolicyType) -> Result<&ModelBundle, AppError> {
        self.bundles.get(&(country, policy_type)).ok_or_else(|| {
            AppError::new(MODEL_MISSING, "No model loaded for country and policy type")
                .with_details(format!(
                    "country={}; policy_type={}",
                    country.as_str(),
                    policy_type.as_str()
                ))
        })
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

fn parse_dir_key(name: &str) -> Option<(Country, PolicyType)> {
    let (country, policy) = name.split_once('_')?;
    Some((country.parse().ok()?, policy.parse().ok()?))
}
