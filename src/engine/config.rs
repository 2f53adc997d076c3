//! Firmware Registry Configuration Module
//! Load order: defaults -> JSON file (optional) -> environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "fwregistry.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub public_base_url: String,
    pub storage_dir: PathBuf,
    pub db_path: PathBuf,
    pub admin_key: String,
    pub device_key: String,
    pub max_upload_mb: u64,
    pub oidc: OidcConfig,
    pub webhooks: WebhookConfig,
}

/// OIDC token verification. Off by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    pub enabled: bool,
    pub issuer_url: String,
    pub client_id: String,
    pub audience: String,
    pub admin_role: String,
    pub device_role: String,
    pub jwks_cache_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub secret: String,
    pub timeout_sec: u64,
    /// Extra attempts after the first; negative values are treated as zero.
    pub retries: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            public_base_url: String::new(),
            storage_dir: PathBuf::from("/data/firmware"),
            db_path: PathBuf::from("/data/db/firmware-registry.db"),
            admin_key: String::new(),
            device_key: String::new(),
            max_upload_mb: 50,
            oidc: OidcConfig::default(),
            webhooks: WebhookConfig::default(),
        }
    }
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer_url: String::new(),
            client_id: String::new(),
            audience: String::new(),
            admin_role: String::new(),
            device_role: String::new(),
            jwks_cache_sec: 300,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            timeout_sec: 5,
            retries: 3,
        }
    }
}

impl Config {
    /// Load config from an optional JSON file, then apply `FW_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Blank values are ignored. Numeric overrides that fail to parse or fall
    /// outside their valid range keep the current value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        set_str(&mut self.listen_addr, get("FW_LISTEN_ADDR"));
        set_str(&mut self.public_base_url, get("FW_PUBLIC_BASE_URL"));
        if let Some(v) = get("FW_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(v);
        }
        if let Some(v) = get("FW_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        set_str(&mut self.admin_key, get("FW_ADMIN_KEY"));
        set_str(&mut self.device_key, get("FW_DEVICE_KEY"));

        if let Some(n) = get("FW_MAX_UPLOAD_MB").and_then(|v| v.parse::<u64>().ok()) {
            if n > 0 {
                self.max_upload_mb = n;
            }
        }

        set_str(&mut self.webhooks.secret, get("FW_WEBHOOK_SECRET"));
        if let Some(n) = get("FW_WEBHOOK_TIMEOUT_SEC").and_then(|v| v.parse::<u64>().ok()) {
            if n > 0 {
                self.webhooks.timeout_sec = n;
            }
        }
        if let Some(n) = get("FW_WEBHOOK_RETRIES").and_then(|v| v.parse::<i64>().ok()) {
            if n >= 0 {
                self.webhooks.retries = n;
            }
        }

        if let Some(v) = get("FW_OIDC_ENABLED") {
            self.oidc.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        set_str(&mut self.oidc.issuer_url, get("FW_OIDC_ISSUER_URL"));
        set_str(&mut self.oidc.client_id, get("FW_OIDC_CLIENT_ID"));
        set_str(&mut self.oidc.audience, get("FW_OIDC_AUDIENCE"));
        set_str(&mut self.oidc.admin_role, get("FW_OIDC_ADMIN_ROLE"));
        set_str(&mut self.oidc.device_role, get("FW_OIDC_DEVICE_ROLE"));
    }

    pub fn max_upload_bytes(&self) -> usize {
        let bytes = self.max_upload_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    pub fn public_base(&self) -> Option<&str> {
        let base = self.public_base_url.trim();
        (!base.is_empty()).then_some(base)
    }
}

fn set_str(dst: &mut String, value: Option<String>) {
    if let Some(v) = value {
        *dst = v;
    }
}
