#[cfg(feature = "s3")]
mod inner {
    use async_trait::async_trait;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::Object;
    use chrono::{DateTime, TimeZone, Utc};
    use std::future::Future;
    use std::path::Path;

    use rbackup_core::config::S3Config;
    use rbackup_core::{Artifact, RbackupError, Result};

    use crate::provider::StorageBackend;

    /// S3-compatible object storage backend.
    ///
    /// Works with AWS S3, MinIO, Garage, Ceph RGW and any other service
    /// implementing the S3 API. Path-style addressing is always used.
    pub struct S3Backend {
        client: Client,
        config: S3Config,
        name: String,
    }

    impl S3Backend {
        pub async fn new(config: &S3Config) -> Self {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_key,
                None,
                None,
                "rbackup-config",
            );

            let sdk_config = aws_config::from_env()
                .region(aws_config::Region::new("us-east-1"))
                .credentials_provider(creds)
                .retry_config(RetryConfig::standard().with_max_attempts(config.retries))
                .load()
                .await;

            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .endpoint_url(&config.endpoint)
                .force_path_style(true)
                .build();

            Self {
                client: Client::from_conf(s3_config),
                config: config.clone(),
                name: format!("s3:{}/{}", config.bucket_name, config.base_dir),
            }
        }

        /// Artifact name for an object key, or `None` if the key is outside
        /// the base path or is a directory marker.
        fn artifact_name(&self, key: &str) -> Option<String> {
            let name = match self.config.list_prefix() {
                Some(prefix) => key.strip_prefix(prefix.as_str())?,
                None => key,
            };
            if name.is_empty() || name.ends_with('/') {
                return None;
            }
            Some(name.to_string())
        }

        async fn fetch_page(&self, prefix: Option<&str>, token: Option<String>) -> Result<Page> {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket_name)
                .set_prefix(prefix.map(str::to_string))
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|e| {
                    RbackupError::BackendUnavailable(DisplayErrorContext(&e).to_string())
                })?;

            Ok(Page {
                objects: resp.contents().to_vec(),
                next_token: resp.next_continuation_token().map(str::to_string),
            })
        }

        async fn exists(&self, key: &str) -> std::result::Result<bool, String> {
            match self
                .client
                .head_object()
                .bucket(&self.config.bucket_name)
                .key(key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                        Ok(false)
                    } else {
                        Err(DisplayErrorContext(&e).to_string())
                    }
                }
            }
        }
    }

    /// One `ListObjectsV2` response.
    struct Page {
        objects: Vec<Object>,
        next_token: Option<String>,
    }

    /// Collect every object across pages, feeding each continuation token
    /// back to `fetch` until a page comes back without one.
    async fn list_pages<F, Fut>(mut fetch: F) -> Result<Vec<Object>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page>>,
    {
        let mut objects = Vec::new();
        let mut token = None;
        loop {
            let page = fetch(token.take()).await?;
            objects.extend(page.objects);
            // Only truncated listings carry a continuation token.
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(objects),
            }
        }
    }

    fn to_utc(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(dt.secs(), dt.subsec_nanos()).single()
    }

    #[async_trait]
    impl StorageBackend for S3Backend {
        async fn list_files(&self) -> Result<Vec<Artifact>> {
            let prefix = self.config.list_prefix();
            let objects = list_pages(|token| self.fetch_page(prefix.as_deref(), token)).await?;

            let mut results = Vec::new();
            for obj in &objects {
                let Some(key) = obj.key() else { continue };
                let Some(name) = self.artifact_name(key) else {
                    continue;
                };
                let Some(last_modified) = obj.last_modified().and_then(to_utc) else {
                    tracing::warn!("Object '{key}' has no usable LastModified, skipping");
                    continue;
                };
                results.push(Artifact::new(name, last_modified));
            }

            Ok(results)
        }

        async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()> {
            let upload_failed = |reason: String| RbackupError::UploadFailed {
                name: remote_name.to_string(),
                reason,
            };

            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| upload_failed(format!("cannot read {}: {e}", local_path.display())))?;

            self.client
                .put_object()
                .bucket(&self.config.bucket_name)
                .key(self.config.object_key(remote_name))
                .body(body)
                .send()
                .await
                .map_err(|e| upload_failed(DisplayErrorContext(&e).to_string()))?;
            Ok(())
        }

        async fn delete(&self, remote_name: &str) -> Result<()> {
            let key = self.config.object_key(remote_name);

            // DeleteObject succeeds on missing keys.
            match self.exists(&key).await {
                Ok(true) => {}
                Ok(false) => return Err(RbackupError::NotFound(remote_name.to_string())),
                Err(reason) => {
                    return Err(RbackupError::DeleteFailed {
                        name: remote_name.to_string(),
                        reason,
                    });
                }
            }

            self.client
                .delete_object()
                .bucket(&self.config.bucket_name)
                .key(&key)
                .send()
                .await
                .map_err(|e| RbackupError::DeleteFailed {
                    name: remote_name.to_string(),
                    reason: DisplayErrorContext(&e).to_string(),
                })?;
            Ok(())
        }

        async fn download(&self, remote_name: &str, local_dest: &Path) -> Result<()> {
            let download_failed = |reason: String| RbackupError::DownloadFailed {
                name: remote_name.to_string(),
                reason,
            };

            let resp = self
                .client
                .get_object()
                .bucket(&self.config.bucket_name)
                .key(self.config.object_key(remote_name))
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                        RbackupError::NotFound(remote_name.to_string())
                    } else {
                        download_failed(DisplayErrorContext(&e).to_string())
                    }
                })?;

            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| download_failed(e.to_string()))?;
            tokio::fs::write(local_dest, data.into_bytes())
                .await
                .map_err(|e| download_failed(e.to_string()))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

}

#[cfg(feature = "s3")]
pub use inner::S3Backend;
