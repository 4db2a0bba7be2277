//! Settings loader.
//!
//! Configuration is layered: an optional TOML file provides the base values,
//! a `.env` file in the working directory is merged into the process
//! environment (without overriding variables that are already set), and the
//! process environment finally overrides the file:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `BACKEND_BASE_PATH` / `backend_base_path` | `backend.base_path` |
//! | `DOC_UPLOAD_DIR` / `doc_upload_dir` | `uploads.dir` |
//! | `DOCCHAT_BIND` | `server.bind` |
//!
//! A missing backend URL is not a startup error; every backend
//! call then fails with [`BackendError::NotConfigured`](crate::backend::BackendError)
//! and the UI degrades to an empty sidebar and the generic chat error.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,
    #[serde(default)]
    pub chat_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            page_size: default_page_size(),
            list_timeout_secs: default_list_timeout_secs(),
            chat_timeout_secs: None,
        }
    }
}

fn default_page_size() -> u32 {
    10
}
fn default_list_timeout_secs() -> u64 {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("/home/uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Request body limit for `POST /upload`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

impl Config {
    /// Parse a TOML document without touching the environment or filesystem.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config file")
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Empty values are ignored so that `BACKEND_BASE_PATH=` in a `.env`
    /// file does not clobber a configured URL.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |upper: &str, lower: &str| {
            lookup(upper)
                .or_else(|| lookup(lower))
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(base) = get("BACKEND_BASE_PATH", "backend_base_path") {
            self.backend.base_path = Some(base);
        }
        if let Some(dir) = get("DOC_UPLOAD_DIR", "doc_upload_dir") {
            self.uploads.dir = PathBuf::from(dir);
        }
        if let Some(bind) = get("DOCCHAT_BIND", "docchat_bind") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.page_size == 0 {
            anyhow::bail!("backend.page_size must be > 0");
        }
        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be > 0");
        }
        if !self.uploads.dir.is_dir() {
            anyhow::bail!(
                "uploads.dir must be an existing directory: {}",
                self.uploads.dir.display()
            );
        }
        Ok(())
    }

    /// The backend base URL without a trailing slash, if configured.
    pub fn backend_base(&self) -> Option<&str> {
        self.backend
            .base_path
            .as_deref()
            .map(|b| b.trim_end_matches('/'))
            .filter(|b| !b.is_empty())
    }
}

/// A missing `.env` is normal; any other load failure is worth a warning.
fn dotenv_warning(result: &dotenvy::Result<PathBuf>) -> Option<String> {
    match result {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(format!("failed to load .env: {}", e)),
    }
}

/// Load settings from `path`, `.env`, and the process environment.
///
/// A missing config file is not an error: defaults plus environment
/// overrides are used instead.
pub fn load_config(path: &Path) -> Result<Config> {
    // Variables already present in the process take precedence over `.env`.
    if let Some(warning) = dotenv_warning(&dotenvy::dotenv()) {
        tracing::warn!("{}", warning);
    }

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Config::from_toml(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    if config.backend_base().is_none() {
        tracing::warn!("backend.base_path is not set; backend calls will fail");
    }

    Ok(config)
}
