use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub improver: ImproverConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub path: PathBuf,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default = "default_keyword_column")]
    pub keyword_column: String,
    #[serde(default = "default_categorical_columns")]
    pub categorical_columns: Vec<String>,
    #[serde(default = "default_edit_field")]
    pub edit_field: String,
}

fn default_key_column() -> String {
    "chunk_id".to_string()
}
fn default_keyword_column() -> String {
    "chunk_keyword".to_string()
}
fn default_categorical_columns() -> Vec<String> {
    vec!["dataset_name".to_string(), "document_name".to_string()]
}
fn default_edit_field() -> String {
    "question".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImproverConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for ImproverConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 20,
            max_retries: 0,
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

impl ImproverConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl Config {
    /// Defaults for everything but the dataset path; used when the CLI is
    /// given `--dataset` instead of a config file.
    pub fn for_dataset(path: impl Into<PathBuf>) -> Self {
        Self {
            dataset: DatasetConfig {
                path: path.into(),
                key_column: default_key_column(),
                keyword_column: default_keyword_column(),
                categorical_columns: default_categorical_columns(),
                edit_field: default_edit_field(),
            },
            improver: ImproverConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Relative dataset paths are relative to the config file
    if config.dataset.path.is_relative() {
        if let Some(dir) = path.parent() {
            config.dataset.path = dir.join(&config.dataset.path);
        }
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.dataset.key_column.trim().is_empty() {
        anyhow::bail!("dataset.key_column must not be empty");
    }
    if config.dataset.edit_field.trim().is_empty() {
        anyhow::bail!("dataset.edit_field must not be empty");
    }

    if !(1..=300).contains(&config.improver.timeout_secs) {
        anyhow::bail!("improver.timeout_secs must be in [1, 300]");
    }
    if config.improver.max_retries > 5 {
        anyhow::bail!("improver.max_retries must be <= 5");
    }
    if let Some(url) = &config.improver.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!(
                "improver.url must start with http:// or https://, got '{}'",
                url
            );
        }
    }

    Ok(())
}
