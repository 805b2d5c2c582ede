//! Resolution of backend configuration from a connection string and the
//! process environment.
//!
//! The connection string is either an inline JSON object or a path to a
//! file holding one. Keys missing from the payload fall back to a declared
//! environment variable, then to the key's default.

pub mod backends;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{RbackupError, Result};
use crate::types::BackendKind;

pub use backends::{EncryptedS3Config, LocalConfig, S3Config};

/// Default S3 client attempt budget.
pub const DEFAULT_RETRIES: u32 = 20;

pub const DEFAULT_RCLONE_BINARY: &str = "rclone";

/// One recognized configuration key.
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey {
    pub name: &'static str,
    pub env: &'static str,
    pub default: Option<&'static str>,
}

const fn key(name: &'static str, env: &'static str) -> ConfigKey {
    ConfigKey {
        name,
        env,
        default: None,
    }
}

const fn key_or(name: &'static str, env: &'static str, default: &'static str) -> ConfigKey {
    ConfigKey {
        name,
        env,
        default: Some(default),
    }
}

const LOCAL_KEYS: &[ConfigKey] = &[key("path", "RBACKUP_PATH")];

const S3_KEYS: &[ConfigKey] = &[
    key("endpoint", "RBACKUP_ENDPOINT"),
    key("access_key_id", "RBACKUP_ACCESS_KEY_ID"),
    key("secret_key", "RBACKUP_SECRET_KEY"),
    key("bucket_name", "RBACKUP_BUCKET_NAME"),
    key("base_dir", "RBACKUP_BASE_DIR"),
    key_or("retries", "RBACKUP_RETRIES", "20"),
];

const S3_ENCRYPTED_KEYS: &[ConfigKey] = &[
    key("endpoint", "RBACKUP_ENDPOINT"),
    key("access_key_id", "RBACKUP_ACCESS_KEY_ID"),
    key("secret_key", "RBACKUP_SECRET_KEY"),
    key("bucket_name", "RBACKUP_BUCKET_NAME"),
    key("base_dir", "RBACKUP_BASE_DIR"),
    key_or("retries", "RBACKUP_RETRIES", "20"),
    key("enc_password", "RBACKUP_ENC_PASSWORD"),
    key("enc_salt_password", "RBACKUP_ENC_SALT_PASSWORD"),
    key_or("rclone_binary", "RBACKUP_RCLONE_BINARY", DEFAULT_RCLONE_BINARY),
];

/// Keys recognized for a backend kind.
pub fn keys_for(kind: BackendKind) -> &'static [ConfigKey] {
    match kind {
        BackendKind::Local => LOCAL_KEYS,
        BackendKind::S3 => S3_KEYS,
        BackendKind::S3Encrypted => S3_ENCRYPTED_KEYS,
    }
}

fn env_name(name: &str) -> &'static str {
    [LOCAL_KEYS, S3_ENCRYPTED_KEYS]
        .iter()
        .flat_map(|keys| keys.iter())
        .find(|k| k.name == name)
        .map(|k| k.env)
        .unwrap_or("")
}

/// Values that must never show up in logs or `Debug` output.
pub fn is_secret_key(name: &str) -> bool {
    name.contains("secret") || name.contains("password")
}

/// Parse a connection string into a flat JSON object.
///
/// A string that doesn't start with `{` and names an existing file is read
/// from disk; anything else is parsed as the payload itself.
pub fn load_payload(remote: &str) -> Result<Map<String, Value>> {
    let trimmed = remote.trim();
    let is_file_path =
        !trimmed.starts_with('{') && !trimmed.is_empty() && Path::new(trimmed).is_file();
    let content = if is_file_path {
        std::fs::read_to_string(trimmed).map_err(|e| {
            RbackupError::InvalidConfiguration(format!("cannot read {trimmed}: {e}"))
        })?
    } else {
        trimmed.to_string()
    };

    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RbackupError::InvalidConfiguration(
            "remote configuration must be a JSON object".to_string(),
        )),
        Err(e) => Err(RbackupError::InvalidConfiguration(format!(
            "remote configuration is not valid JSON: {e}"
        ))),
    }
}

/// Flat key/value configuration after payload and environment fallbacks.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    values: BTreeMap<String, String>,
}

impl ResolvedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every key declared for `kind`.
    ///
    /// `env` is the environment lookup, injected so resolution can be tested
    /// without touching the process environment.
    pub fn resolve<F>(kind: BackendKind, payload: &Map<String, Value>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved = Self::new();
        for k in keys_for(kind) {
            let value = match payload.get(k.name) {
                Some(v) => Some(scalar_to_string(k.name, v)?),
                None => env(k.env).or_else(|| k.default.map(str::to_string)),
            };
            if let Some(value) = value {
                resolved.values.insert(k.name.to_string(), value);
            }
        }

        tracing::debug!(
            kind = %kind,
            keys = ?resolved.values.keys().collect::<Vec<_>>(),
            "Resolved backend configuration"
        );
        Ok(resolved)
    }

    /// Resolve from a connection string against the real process environment.
    pub fn from_remote(kind: BackendKind, remote: &str) -> Result<Self> {
        let payload = load_payload(remote)?;
        Self::resolve(kind, &payload, |name| std::env::var(name).ok())
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a mandatory key.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| RbackupError::MissingConfiguration {
            key: key.to_string(),
            env: env_name(key).to_string(),
        })
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.values {
            if is_secret_key(k) {
                map.entry(k, &"[REDACTED]");
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(RbackupError::InvalidConfiguration(format!(
            "'{key}' must be a string, number or boolean"
        ))),
    }
}
