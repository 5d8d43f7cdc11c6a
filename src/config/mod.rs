use crate::error::{CapmError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default)]
    pub log_level: String,

    /// Passed to the backend on connect; it talks to Graph with this setting
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Per-item timeout for bulk runs, unset means wait forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            log_level: String::new(),
            verify_ssl: default_verify_ssl(),
            action_timeout_secs: None,
            credentials: None,
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_verify_ssl() -> bool {
    true
}

impl Config {
    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// App registration used by the backend for client-credentials auth
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "capm", "capm").ok_or_else(|| {
            CapmError::ConfigError("Failed to determine config directory".into())
        })?;

        Self::with_dir(project_dirs.config_dir())
    }

    /// Use an explicit directory instead of the platform default
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn env_file(&self) -> PathBuf {
        self.config_dir.join(".env")
    }

    /// Load main config
    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save main config
    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)
            .map_err(|e| CapmError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    /// Update a single key and persist
    pub fn set_value(&self, key: &str, value: &str) -> Result<Config> {
        let mut config = self.load_config()?;

        match key {
            "server_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(CapmError::InvalidArgument(format!(
                        "server_url must start with http:// or https://, got '{}'",
                        value
                    )));
                }
                config.server_url = value.trim_end_matches('/').to_string();
            }
            "log_level" => config.log_level = value.to_string(),
            "verify_ssl" => {
                config.verify_ssl = value.parse().map_err(|_| {
                    CapmError::InvalidArgument(format!("verify_ssl expects true/false, got '{}'", value))
                })?;
            }
            "action_timeout_secs" => {
                let secs: u64 = value.parse().map_err(|_| {
                    CapmError::InvalidArgument(format!(
                        "action_timeout_secs expects a number of seconds, got '{}'",
                        value
                    ))
                })?;
                config.action_timeout_secs = (secs > 0).then_some(secs);
            }
            "tenant_id" | "client_id" | "client_secret" => {
                let mut creds = config.credentials.take().unwrap_or(Credentials {
                    tenant_id: String::new(),
                    client_id: String::new(),
                    client_secret: String::new(),
                });
                match key {
                    "tenant_id" => creds.tenant_id = value.to_string(),
                    "client_id" => creds.client_id = value.to_string(),
                    _ => creds.client_secret = value.to_string(),
                }
                config.credentials = Some(creds);
            }
            other => {
                return Err(CapmError::InvalidArgument(format!(
                    "Unknown config key '{}'",
                    other
                )));
            }
        }

        self.save_config(&config)?;
        Ok(config)
    }

    /// Credentials from config.toml, falling back to a .env file in the config dir
    ///
    /// Supports format:
    /// ```text
    /// TENANT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_SECRET=your-secret-here
    /// ```
    pub fn load_credentials(&self) -> Result<Option<Credentials>> {
        let config = self.load_config()?;
        if let Some(creds) = config.credentials {
            if !creds.tenant_id.is_empty() && !creds.client_id.is_empty() {
                return Ok(Some(creds));
            }
        }

        let env_path = self.env_file();
        if !env_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(env_path)?;
        let vars = parse_env_file(&contents);

        match (
            vars.get("TENANT_ID"),
            vars.get("CLIENT_ID"),
            vars.get("CLIENT_SECRET"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Ok(Some(Credentials {
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            })),
            _ => Ok(None),
        }
    }
}

/// Parse simple KEY=VALUE lines; keys are upper-cased
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            let value = if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                &value[1..value.len() - 1]
            } else {
                value
            };

            vars.insert(key.trim().to_uppercase(), value.to_string());
        }
    }

    vars
}
