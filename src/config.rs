// Configuration: API connection settings and the SFTP server inventory.
//
// API settings normally arrive through clap (flags or NOIPFRAUD_* env
// vars, optionally from a `.env` file). The server inventory is a small
// TOML file so hosts and key paths stay out of the source tree.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tokens issued by the login endpoint are valid for five hours.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 5;
/// Upper bound for the token TTL, one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for `NoIPFraudClient`.
#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub token_ttl: chrono::Duration,
}

impl ApiConfig {
    /// Build a config with default timeout and token lifetime. A trailing
    /// slash on the base URL is dropped so endpoint paths join cleanly.
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        ApiConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token_ttl: chrono::Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

fn default_port() -> u16 {
    22
}

fn default_username() -> String {
    "ubuntu".into()
}

/// One SFTP target from the inventory file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    pub key_file: PathBuf,
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Named servers, kept sorted by name so probe output is stable.
#[derive(Debug, Default, Deserialize)]
pub struct ServerInventory {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

impl ServerInventory {
    /// Parse an inventory from TOML text. Relative key paths are resolved
    /// against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self> {
        let mut inventory: ServerInventory =
            toml::from_str(text).context("Parsing server inventory")?;
        for server in inventory.servers.values_mut() {
            if server.key_file.is_relative() {
                server.key_file = base_dir.join(&server.key_file);
            }
        }
        Ok(inventory)
    }

    /// Load the inventory file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read server inventory {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base_dir)
    }

    /// Keep only the named servers. Unknown names are an error so typos
    /// don't silently probe nothing.
    pub fn select(self, names: &[String]) -> Result<BTreeMap<String, ServerConfig>> {
        if names.is_empty() {
            return Ok(self.servers);
        }
        let mut all = self.servers;
        let mut picked = BTreeMap::new();
        for name in names {
            let server = all
                .remove(name)
                .with_context(|| format!("Unknown server: {}", name))?;
            picked.insert(name.clone(), server);
        }
        Ok(picked)
    }
}

/// `<config_dir>/noipfraud/servers.toml`, falling back to the working
/// directory when the platform has no config dir.
pub fn default_inventory_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("noipfraud")
        .join("servers.toml")
}
