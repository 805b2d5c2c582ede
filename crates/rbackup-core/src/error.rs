use thiserror::Error;

#[derive(Debug, Error)]
pub enum RbackupError {
    // Config
    #[error("Unknown backend kind: {0}")]
    UnknownBackendKind(String),

    #[error("'{key}' not set. Alternatively you can use the '{env}' environment variable")]
    MissingConfiguration { key: String, env: String },

    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    // Retention
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // Storage
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Upload of '{name}' failed: {reason}")]
    UploadFailed { name: String, reason: String },

    #[error("Download of '{name}' failed: {reason}")]
    DownloadFailed { name: String, reason: String },

    #[error("Delete of '{name}' failed: {reason}")]
    DeleteFailed { name: String, reason: String },

    // External tool
    #[error("`{command}` exited with {code}: {stderr}")]
    ExternalToolFailed {
        command: String,
        code: String,
        stderr: String,
    },
}

impl RbackupError {
    /// Whether a failed delete means the artifact is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RbackupError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, RbackupError>;
