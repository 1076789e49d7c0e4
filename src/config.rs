//! Server configuration (`nav.config.yaml`).
//!
//! Holds operational parameters and secrets: listen port, auth token, mail
//! transport, public address. Never exposed to unauthenticated callers.
//! Keys the server does not interpret are preserved in `rest`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{NavError, Result};
use crate::files;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub port: u16,
    /// Token expected in `Authorization: token <password>`.
    #[serde(default)]
    pub password: String,
    /// Public base address, used to build absolute upload URLs.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hash_mode: bool,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_config: Option<MailConfig>,
    #[serde(
        rename = "XFAPIPassword",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub xf_api_password: Option<String>,
    /// Base URL of the remote fallback service for translate/screenshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_api: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub auth: MailAuth,
    /// Notification subject.
    #[serde(default)]
    pub title: String,
    /// Notification HTML body.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MailAuth {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

impl Config {
    /// True when `header` is exactly `token <password>` and a password is set.
    pub fn accepts_token(&self, header: Option<&str>) -> bool {
        if self.password.is_empty() {
            return false;
        }
        match header.and_then(|h| h.strip_prefix("token ")) {
            Some(token) => token == self.password,
            None => false,
        }
    }
}

/// Parses the YAML config. Malformed files are fatal at startup.
pub async fn load_config(path: &Path) -> Result<Config> {
    let text = files::read_text(path).await?;
    parse_config(path, &text)
}

fn parse_config(path: &Path, text: &str) -> Result<Config> {
    serde_yaml::from_str(text).map_err(|source| NavError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn to_yaml(path: &Path, config: &Config) -> Result<String> {
    serde_yaml::to_string(config).map_err(|e| NavError::Serialize {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

/// Shallow-merges `patch` over `current`: each top-level key in the patch
/// replaces the whole value of that key.
pub fn merge_config(current: &Config, patch: &Value) -> Result<Config> {
    let patch = patch
        .as_object()
        .ok_or_else(|| NavError::validation("config patch must be a JSON object"))?;

    let mut merged = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(NavError::validation(e.to_string())),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| NavError::validation(format!("invalid config: {}", e)))
}
