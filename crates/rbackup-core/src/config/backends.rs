use std::fmt;
use std::path::PathBuf;

use super::{DEFAULT_RCLONE_BINARY, DEFAULT_RETRIES, ResolvedConfig};
use crate::error::{RbackupError, Result};

/// Local directory used as a "remote" destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: PathBuf,
}

impl LocalConfig {
    pub fn from_resolved(config: &ResolvedConfig) -> Result<Self> {
        Ok(Self {
            path: PathBuf::from(config.require("path")?),
        })
    }
}

/// S3-compatible object storage.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_key: String,
    pub bucket_name: String,
    /// Key prefix, already stripped of surrounding spaces and `/`.
    pub base_dir: String,
    /// Total attempts the client makes on transient errors.
    pub retries: u32,
}

impl S3Config {
    pub fn from_resolved(config: &ResolvedConfig) -> Result<Self> {
        let retries = match config.get("retries") {
            Some(raw) => parse_retries(raw)?,
            None => DEFAULT_RETRIES,
        };

        Ok(Self {
            endpoint: config.require("endpoint")?.to_string(),
            access_key_id: config.require("access_key_id")?.to_string(),
            secret_key: config.require("secret_key")?.to_string(),
            bucket_name: config.require("bucket_name")?.to_string(),
            base_dir: normalize_base_dir(config.require("base_dir")?),
            retries,
        })
    }

    /// Full object key for an artifact name.
    pub fn object_key(&self, name: &str) -> String {
        if self.base_dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.base_dir, name)
        }
    }

    /// Listing prefix, including the trailing separator.
    pub fn list_prefix(&self) -> Option<String> {
        if self.base_dir.is_empty() {
            None
        } else {
            Some(format!("{}/", self.base_dir))
        }
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"[REDACTED]")
            .field("bucket_name", &self.bucket_name)
            .field("base_dir", &self.base_dir)
            .field("retries", &self.retries)
            .finish()
    }
}

/// S3 storage wrapped in an rclone `crypt` remote.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedS3Config {
    pub s3: S3Config,
    pub enc_password: String,
    pub enc_salt_password: String,
    pub rclone_binary: PathBuf,
}

impl EncryptedS3Config {
    pub fn from_resolved(config: &ResolvedConfig) -> Result<Self> {
        let s3 = S3Config::from_resolved(config)?;
        Ok(Self {
            s3,
            enc_password: config.require("enc_password")?.to_string(),
            enc_salt_password: config.require("enc_salt_password")?.to_string(),
            rclone_binary: PathBuf::from(
                config
                    .get("rclone_binary")
                    .unwrap_or(DEFAULT_RCLONE_BINARY),
            ),
        })
    }
}

impl fmt::Debug for EncryptedS3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedS3Config")
            .field("s3", &self.s3)
            .field("enc_password", &"[REDACTED]")
            .field("enc_salt_password", &"[REDACTED]")
            .field("rclone_binary", &self.rclone_binary)
            .finish()
    }
}

fn parse_retries(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RbackupError::InvalidConfiguration(format!(
            "'retries' must be a positive integer, got '{raw}'"
        ))),
    }
}

pub fn normalize_base_dir(base_dir: &str) -> String {
    base_dir.trim_matches(|c| c == ' ' || c == '/').to_string()
}
