//! Configuration for plansmith.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PLANSMITH_HOME, PLANSMITH_DB, GEMINI_API_KEY,
//!    GEMINI_MODEL, GEMINI_BASE_URL)
//! 2. Config file (.plansmith/config.yaml)
//! 3. Defaults (~/.plansmith)
//!
//! Config file discovery:
//! - Searches current directory and parents for .plansmith/config.yaml
//! - Paths in config file are relative to the .plansmith/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .plansmith/)
    pub home: Option<String>,
    /// Library database file (relative to .plansmith/)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Library database file
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub storage: StorageSettings,
    pub gemini: GeminiSettings,
}

#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    /// Library size cap; unlimited when absent
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".plansmith").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Merge environment, optional config file and defaults
fn resolve(config_path: Option<&Path>, default_home: PathBuf) -> Result<ResolvedConfig> {
    let file = config_path.map(load_config_file).transpose()?;
    let config_dir = config_path
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env_var("PLANSMITH_HOME") {
        PathBuf::from(env_home)
    } else if let Some(home_path) = file.as_ref().and_then(|f| f.paths.home.as_deref()) {
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let database = if let Some(env_db) = env_var("PLANSMITH_DB") {
        PathBuf::from(env_db)
    } else if let Some(db_path) = file.as_ref().and_then(|f| f.paths.database.as_deref()) {
        resolve_path(config_dir, db_path)
    } else {
        home.join("library.db")
    };

    let storage = StorageSettings {
        max_bytes: file
            .as_ref()
            .and_then(|f| f.storage.as_ref())
            .and_then(|s| s.max_bytes),
    };

    let gemini_file = file.as_ref().and_then(|f| f.gemini.clone()).unwrap_or_default();
    let gemini = GeminiSettings {
        api_key: env_var("GEMINI_API_KEY").or_else(|| env_var("API_KEY")),
        model: env_var("GEMINI_MODEL")
            .or(gemini_file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        base_url: env_var("GEMINI_BASE_URL")
            .or(gemini_file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        timeout_seconds: gemini_file
            .timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    };

    Ok(ResolvedConfig {
        home,
        database,
        config_file: config_path.map(Path::to_path_buf),
        storage,
        gemini,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".plansmith");

    resolve(find_config_file().as_deref(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the plansmith home directory
pub fn plansmith_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the library database path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}
