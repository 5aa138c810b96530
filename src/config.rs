//! Runtime configuration read from `aether.yaml`.

use crate::integrity::DEFAULT_THRESHOLD;
use crate::types::DEFAULT_ENERGY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE: &str = "aether.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Headline source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        NewsConfig {
            endpoint: "https://min-api.cryptocompare.com/data/v2/news/".to_string(),
            api_key_env: "NEWS_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

impl NewsConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AetherConfig {
    pub default_energy: f64,
    pub energy_cost: f64,
    pub integrity_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub news: NewsConfig,
}

impl Default for AetherConfig {
    fn default() -> Self {
        AetherConfig {
            default_energy: DEFAULT_ENERGY,
            energy_cost: 5.0,
            integrity_threshold: DEFAULT_THRESHOLD,
            seed: None,
            news: NewsConfig::default(),
        }
    }
}

/// Read a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AetherConfig, ConfigError> {
    if !path.exists() {
        return Ok(AetherConfig::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(AetherConfig::default());
    }
    Ok(serde_yaml::from_str(&content)?)
}

/// The commented config written by `aether init`.
pub fn default_config_yaml() -> String {
    let defaults = AetherConfig::default();
    format!(
        "# Aether configuration\n\
         default_energy: {}\n\
         energy_cost: {}\n\
         integrity_threshold: {}\n\
         # seed: 42\n\
         news:\n  endpoint: \"{}\"\n  api_key_env: {}\n  timeout_secs: {}\n",
        defaults.default_energy,
        defaults.energy_cost,
        defaults.integrity_threshold,
        defaults.news.endpoint,
        defaults.news.api_key_env,
        defaults.news.timeout_secs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, AetherConfig::default());
        assert_eq!(config.integrity_threshold, 20.0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "energy_cost: 2.5\nseed: 7\nnews:\n  timeout_secs: 3\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.energy_cost, 2.5);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.default_energy, DEFAULT_ENERGY);
        assert_eq!(config.news.timeout_secs, 3);
        assert_eq!(config.news.api_key_env, "NEWS_API_KEY");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "energy_cost: [not, a, number]\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_generated_yaml_parses_to_defaults() {
        let config: AetherConfig = serde_yaml::from_str(&default_config_yaml()).unwrap();
        assert_eq!(config, AetherConfig::default());
    }
}
