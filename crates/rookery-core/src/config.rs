//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, the endpoint paths the pipeline needs to know about,
//! and the last used username for login prefill.
//!
//! Configuration is stored at `~/.config/rookery/config.json`. A partial
//! file is fine; missing fields fall back to the defaults below.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/session directory paths
pub const APP_NAME: &str = "rookery";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default base URL for the Rookery backend
const DEFAULT_API_BASE_URL: &str = "https://api.rookery.app";

/// Default path of the credential renewal endpoint
const DEFAULT_RENEWAL_PATH: &str = "/auth/renew";

/// Default path of the login endpoint
const DEFAULT_LOGIN_PATH: &str = "/auth/login";

/// Default path of the logout endpoint
const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";

/// Default path of the authenticated profile endpoint
const DEFAULT_PROFILE_PATH: &str = "/auth/me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_renewal_path")]
    pub renewal_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    #[serde(default)]
    pub last_username: Option<String>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_renewal_path() -> String {
    DEFAULT_RENEWAL_PATH.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

fn default_profile_path() -> String {
    DEFAULT_PROFILE_PATH.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            renewal_path: default_renewal_path(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
            profile_path: default_profile_path(),
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Absolute URL for an API path, tolerant of slash placement on either
    /// side of the join.
    pub fn endpoint_url(&self, path: &str) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}
