use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::RbackupError;

/// One stored file/object managed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Name relative to the backend's base path. Unique within that scope.
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            last_modified,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.last_modified.to_rfc3339())
    }
}

/// Closed set of supported storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    S3,
    S3Encrypted,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::S3Encrypted => "s3-encrypted",
        }
    }
}

impl FromStr for BackendKind {
    type Err = RbackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "local" => Ok(BackendKind::Local),
            "s3" | "object-storage" => Ok(BackendKind::S3),
            "s3-encrypted" | "object-storage-encrypted" => Ok(BackendKind::S3Encrypted),
            other => Err(RbackupError::UnknownBackendKind(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
