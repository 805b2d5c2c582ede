//! Encrypted object storage through rclone's `crypt` remote.
//!
//! Every operation shells out to the rclone binary with a freshly written
//! configuration file holding two remotes: a plain S3 remote and a `crypt`
//! remote layered on top of it. The file lives in a private temporary
//! directory that is removed when the operation returns, on every path.
//!
//! This backend depends on rclone's CLI and its `lsjson` output shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use rbackup_core::config::EncryptedS3Config;
use rbackup_core::{Artifact, RbackupError, Result};

use crate::provider::StorageBackend;

const STORAGE_REMOTE: &str = "storage";
const CRYPT_REMOTE: &str = "encrypted";
const CONFIG_FILE_NAME: &str = "rclone.conf";

/// rclone exit codes for a missing directory or file.
const EXIT_DIR_NOT_FOUND: i32 = 3;
const EXIT_FILE_NOT_FOUND: i32 = 4;

/// S3 storage encrypted client-side by rclone.
pub struct RcloneCryptBackend {
    config: EncryptedS3Config,
    name: String,
}

/// One entry of `rclone lsjson` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsJsonEntry {
    path: String,
    mod_time: String,
    #[serde(default)]
    is_dir: bool,
}

/// Configuration scoped to a single rclone invocation.
struct Session {
    // Dropping the TempDir removes the config file with it.
    _dir: TempDir,
    config_path: PathBuf,
}

impl RcloneCryptBackend {
    pub fn new(config: &EncryptedS3Config) -> Self {
        Self {
            config: config.clone(),
            name: format!(
                "s3-encrypted:{}/{}",
                config.s3.bucket_name, config.s3.base_dir
            ),
        }
    }

    /// Run `rclone obscure`, feeding the secret on stdin so it never shows
    /// up in the process list.
    async fn obscure(&self, secret: &str) -> Result<String> {
        let mut child = Command::new(&self.config.rclone_binary)
            .args(["obscure", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_failed("obscure", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(format!("{secret}\n").as_bytes())
                .await
                .map_err(|e| self.spawn_failed("obscure", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_failed("obscure", e))?;
        if !output.status.success() {
            return Err(RbackupError::ExternalToolFailed {
                command: "rclone obscure".to_string(),
                code: exit_code(&output),
                stderr: stderr_of(&output),
            });
        }

        let obscured = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if obscured.is_empty() {
            return Err(RbackupError::ExternalToolFailed {
                command: "rclone obscure".to_string(),
                code: "0".to_string(),
                stderr: "empty output".to_string(),
            });
        }
        Ok(obscured)
    }

    fn render_config(&self, password: &str, password2: &str) -> String {
        let s3 = &self.config.s3;
        let target = if s3.base_dir.is_empty() {
            s3.bucket_name.clone()
        } else {
            format!("{}/{}", s3.bucket_name, s3.base_dir)
        };

        format!(
            "[{STORAGE_REMOTE}]\n\
             type = s3\n\
             provider = Other\n\
             env_auth = false\n\
             access_key_id = {access_key_id}\n\
             secret_access_key = {secret_key}\n\
             endpoint = {endpoint}\n\
             force_path_style = true\n\
             \n\
             [{CRYPT_REMOTE}]\n\
             type = crypt\n\
             remote = {STORAGE_REMOTE}:{target}\n\
             password = {password}\n\
             password2 = {password2}\n",
            access_key_id = s3.access_key_id,
            secret_key = s3.secret_key,
            endpoint = s3.endpoint,
        )
    }

    async fn session(&self) -> Result<Session> {
        let password = self.obscure(&self.config.enc_password).await?;
        let password2 = self.obscure(&self.config.enc_salt_password).await?;

        let io_failed = |e: std::io::Error| RbackupError::ExternalToolFailed {
            command: "rclone config".to_string(),
            code: "n/a".to_string(),
            stderr: format!("cannot write temporary config: {e}"),
        };

        let dir = tempfile::Builder::new()
            .prefix("rbackup-rclone-")
            .tempdir()
            .map_err(io_failed)?;
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&config_path).map_err(io_failed)?;
        file.write_all(self.render_config(&password, &password2).as_bytes())
            .map_err(io_failed)?;

        Ok(Session {
            _dir: dir,
            config_path,
        })
    }

    /// Run an rclone subcommand against a session's config.
    async fn run(&self, session: &Session, subcommand: &str, args: &[&OsStr]) -> Result<Output> {
        let mut cmd = Command::new(&self.config.rclone_binary);
        cmd.arg("--config")
            .arg(&session.config_path)
            .arg(subcommand)
            .args(args)
            .arg("--low-level-retries")
            .arg(self.config.s3.retries.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!("Running rclone {subcommand} {:?}", args);
        cmd.output()
            .await
            .map_err(|e| self.spawn_failed(subcommand, e))
    }

    fn spawn_failed(&self, subcommand: &str, e: std::io::Error) -> RbackupError {
        RbackupError::ExternalToolFailed {
            command: format!("{} {subcommand}", self.config.rclone_binary.display()),
            code: "spawn error".to_string(),
            stderr: e.to_string(),
        }
    }
}

fn remote_path(remote_name: &str) -> OsString {
    OsString::from(format!("{CRYPT_REMOTE}:{remote_name}"))
}

fn exit_code(output: &Output) -> String {
    match output.status.code() {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn failure_reason(output: &Output) -> String {
    format!("rclone exited with {}: {}", exit_code(output), stderr_of(output))
}

fn is_not_found(output: &Output) -> bool {
    matches!(
        output.status.code(),
        Some(EXIT_FILE_NOT_FOUND) | Some(EXIT_DIR_NOT_FOUND)
    ) || stderr_of(output).contains("object not found")
}

/// Parse `rclone lsjson` output, one object per line inside `[` / `]`.
fn parse_lsjson(stdout: &str) -> Result<Vec<Artifact>> {
    let mut results = Vec::new();

    for line in stdout.lines() {
        let line = line.trim().trim_end_matches(',');
        if line.is_empty() || line == "[" || line == "]" || line == "[]" {
            continue;
        }

        let entry: LsJsonEntry = serde_json::from_str(line).map_err(|e| {
            RbackupError::BackendUnavailable(format!("unexpected rclone lsjson output: {e}"))
        })?;
        if entry.is_dir {
            continue;
        }

        let last_modified = DateTime::parse_from_rfc3339(&entry.mod_time)
            .map_err(|e| {
                RbackupError::BackendUnavailable(format!(
                    "bad ModTime '{}' for {}: {e}",
                    entry.mod_time, entry.path
                ))
            })?
            .with_timezone(&Utc);
        results.push(Artifact::new(entry.path, last_modified));
    }

    Ok(results)
}

#[async_trait]
impl StorageBackend for RcloneCryptBackend {
    async fn list_files(&self) -> Result<Vec<Artifact>> {
        let session = self.session().await?;
        let root = remote_path("");
        let output = self
            .run(
                &session,
                "lsjson",
                &[root.as_os_str(), OsStr::new("--files-only")],
            )
            .await?;

        if output.status.code() == Some(EXIT_DIR_NOT_FOUND) {
            // S3 has no directories: a prefix without objects doesn't exist yet.
            tracing::debug!("{} has no objects yet", self.name);
            return Ok(Vec::new());
        }
        if !output.status.success() {
            return Err(RbackupError::BackendUnavailable(failure_reason(&output)));
        }
        parse_lsjson(&String::from_utf8_lossy(&output.stdout))
    }

    async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()> {
        if !local_path.is_file() {
            return Err(RbackupError::UploadFailed {
                name: remote_name.to_string(),
                reason: format!("{} is not a readable file", local_path.display()),
            });
        }

        let session = self.session().await?;
        let dest = remote_path(remote_name);
        let output = self
            .run(
                &session,
                "copyto",
                &[local_path.as_os_str(), dest.as_os_str()],
            )
            .await?;

        if !output.status.success() {
            return Err(RbackupError::UploadFailed {
                name: remote_name.to_string(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }

    async fn delete(&self, remote_name: &str) -> Result<()> {
        let session = self.session().await?;
        let target = remote_path(remote_name);
        let output = self
            .run(&session, "deletefile", &[target.as_os_str()])
            .await?;

        if output.status.success() {
            Ok(())
        } else if is_not_found(&output) {
            Err(RbackupError::NotFound(remote_name.to_string()))
        } else {
            Err(RbackupError::DeleteFailed {
                name: remote_name.to_string(),
                reason: failure_reason(&output),
            })
        }
    }

    async fn download(&self, remote_name: &str, local_dest: &Path) -> Result<()> {
        let session = self.session().await?;
        let src = remote_path(remote_name);
        let output = self
            .run(&session, "copyto", &[src.as_os_str(), local_dest.as_os_str()])
            .await?;

        if output.status.success() {
            Ok(())
        } else if is_not_found(&output) {
            Err(RbackupError::NotFound(remote_name.to_string()))
        } else {
            Err(RbackupError::DownloadFailed {
                name: remote_name.to_string(),
                reason: failure_reason(&output),
            })
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
