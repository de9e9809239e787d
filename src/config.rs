use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_MAX_AGE_MS;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";
pub const DEFAULT_CACHE_VERSION: &str = "2";

/// Construction configuration for a [`CachedRequest`](crate::CachedRequest).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL that request paths are resolved against
  pub base_url: String,
  /// Headers sent with every request unless overridden per call
  pub default_headers: BTreeMap<String, String>,
  /// Store namespace; changing it starts a new, empty cache
  pub cache_version: String,
  /// Default max age of cached responses, in milliseconds
  pub max_cache_age_ms: u64,
  /// Directory holding the cache database (defaults to the data dir)
  pub cache_dir: Option<PathBuf>,
  /// Authorization scheme put before the token ("token", "Bearer", ...)
  pub auth_scheme: String,
}

impl Default for Config {
  fn default() -> Self {
    let mut default_headers = BTreeMap::new();
    default_headers.insert("Accept".to_string(), DEFAULT_ACCEPT.to_string());

    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      default_headers,
      cache_version: DEFAULT_CACHE_VERSION.to_string(),
      max_cache_age_ms: DEFAULT_MAX_AGE_MS,
      cache_dir: None,
      auth_scheme: "token".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./reqcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/reqcache/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("reqcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("reqcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Path of the cache database for the configured version.
  ///
  /// Versions may only use ASCII letters, digits, `.`, `_` and `-`, so
  /// each version names a distinct file.
  pub fn cache_path(&self) -> Result<PathBuf> {
    let dir = match &self.cache_dir {
      Some(dir) => dir.clone(),
      None => dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
        .ok_or_else(|| eyre!("Could not determine data directory"))?
        .join("reqcache"),
    };

    let version = &self.cache_version;
    if let Some(bad) = version
      .chars()
      .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
      return Err(eyre!(
        "cache_version {:?} contains unsupported character {:?}",
        version,
        bad
      ));
    }

    Ok(dir.join(format!("cache-v{}.db", version)))
  }

  /// Authorization header value for `token`.
  pub fn authorization(&self, token: &str) -> String {
    if self.auth_scheme.is_empty() {
      token.to_string()
    } else {
      format!("{} {}", self.auth_scheme, token)
    }
  }
}
