use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "offline-dispatch";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Root of the remote resource endpoint
  pub base_url: Url,
  /// Directory for the local store and logs (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  #[serde(default)]
  pub probe: ProbeConfig,
  /// Log filter directive, overridden by RUST_LOG
  #[serde(default = "default_log_filter")]
  pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
  /// URL to probe for reachability (defaults to base_url)
  pub url: Option<Url>,
  #[serde(default = "default_probe_interval")]
  pub interval_secs: u64,
}

impl Default for ProbeConfig {
  fn default() -> Self {
    Self {
      url: None,
      interval_secs: default_probe_interval(),
    }
  }
}

fn default_request_timeout() -> u64 {
  30
}

fn default_probe_interval() -> u64 {
  15
}

fn default_log_filter() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offline-dispatch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offline-dispatch/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/{}/config.yaml",
        APP_NAME
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from(format!("{}.yaml", APP_NAME));
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_NAME).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// Parse configuration from YAML text.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.probe.interval_secs == 0 {
      return Err(eyre!("probe.interval_secs must be greater than zero"));
    }
    Ok(config)
  }

  /// Directory holding the store and logs.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join(APP_NAME))
  }

  pub fn store_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("store.db"))
  }

  pub fn log_dir(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("logs"))
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn probe_url(&self) -> &Url {
    self.probe.url.as_ref().unwrap_or(&self.base_url)
  }

  pub fn probe_interval(&self) -> Duration {
    Duration::from_secs(self.probe.interval_secs)
  }
}
