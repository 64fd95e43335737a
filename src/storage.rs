use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("other: {0}")]
    Other(String),
}

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Path-addressed file store. Paths are `/`-separated and relative to the store root.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, path: &str) -> BlobResult<bool>;
    async fn put(&self, path: &str, bytes: &[u8]) -> BlobResult<()>;
    async fn get(&self, path: &str) -> BlobResult<Vec<u8>>;
    /// Fails with `NotFound` when `src` is absent.
    async fn copy(&self, src: &str, dst: &str) -> BlobResult<()>;
    /// Fails with `NotFound` when `src` is absent; overwrites `dst`.
    async fn move_to(&self, src: &str, dst: &str) -> BlobResult<()>;
    /// No-op when absent.
    async fn delete(&self, path: &str) -> BlobResult<()>;
    /// Removes everything under `prefix/`.
    async fn delete_directory(&self, prefix: &str) -> BlobResult<()>;
}

// ---------------- S3 Implementation (MinIO compatible) ----------------
pub struct S3BlobStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub async fn new(
        bucket: String,
        endpoint: String,
        region: String,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.clone()))
            .endpoint_url(endpoint);
        if let (Some(access), Some(secret)) = (access_key, secret_key) {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // path-style addressing: MinIO/local endpoints rarely have wildcard DNS
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!(%bucket, "initialized S3 blob store (path-style addressing)");

        if let Err(e) = client.head_bucket().bucket(&bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {e:?}");
            let max_attempts = 8u32;
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e2) if attempt >= max_attempts => {
                        let region_hint = if region != "us-east-1" {
                            " (non-MinIO endpoints may need a CreateBucketConfiguration outside us-east-1)"
                        } else {
                            ""
                        };
                        error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e2:?}");
                        return Err(anyhow::anyhow!(
                            "failed to ensure bucket '{bucket}': {e2}{region_hint}"
                        ));
                    }
                    Err(e2) => {
                        let backoff_ms = 200 * attempt.pow(2);
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e2:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms as u64)).await;
                    }
                }
            }
        }

        Ok(Self { bucket, client })
    }

    /// `CopySource` is `bucket/key` with each key segment URL-encoded.
    fn copy_source(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect();
        format!("{}/{}", self.bucket, encoded.join("/"))
    }

    fn other<E: std::fmt::Debug>(op: &str, key: &str, e: E) -> BlobStoreError {
        error!(op, key, "s3 request failed: {e:?}");
        BlobStoreError::Other(format!("{op} {key}: {e:?}"))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn exists(&self, path: &str) -> BlobResult<bool> {
        match self.client.head_object().bucket(&self.bucket).key(path).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(Self::other("head_object", path, e))
                }
            }
        }
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> BlobResult<()> {
        use aws_sdk_s3::primitives::ByteStream;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(
                infer::get(bytes)
                    .map(|t| t.mime_type().to_string())
                    .unwrap_or_else(|| "application/octet-stream".into()),
            )
            .send()
            .await
            .map_err(|e| Self::other("put_object", path, e))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> BlobResult<Vec<u8>> {
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|_| BlobStoreError::NotFound(path.to_string()))?;
        let data = obj
            .body
            .collect()
            .await
            .map_err(|e| BlobStoreError::Other(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn copy(&self, src: &str, dst: &str) -> BlobResult<()> {
        if !self.exists(src).await? {
            return Err(BlobStoreError::NotFound(src.to_string()));
        }
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(src))
            .key(dst)
            .send()
            .await
            .map_err(|e| Self::other("copy_object", src, e))?;
        Ok(())
    }

    async fn move_to(&self, src: &str, dst: &str) -> BlobResult<()> {
        // S3 has no rename; copy then drop the source
        self.copy(src, dst).await?;
        self.delete(src).await
    }

    async fn delete(&self, path: &str) -> BlobResult<()> {
        // S3 reports success for missing keys
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| Self::other("delete_object", path, e))?;
        Ok(())
    }

    async fn delete_directory(&self, prefix: &str) -> BlobResult<()> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| Self::other("list_objects_v2", &prefix, e))?;
            for key in resp.contents().iter().filter_map(|o| o.key()) {
                self.delete(key).await?;
            }
            match resp.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        debug!(%prefix, "deleted blob directory");
        Ok(())
    }
}

// ---------------- Local filesystem implementation ----------------
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a store path under `root`, refusing absolute paths and `..` segments.
    fn resolve(&self, path: &str) -> BlobResult<PathBuf> {
        let rel = Path::new(path);
        if path.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(BlobStoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    async fn ensure_parent(target: &Path) -> BlobResult<()> {
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        Ok(())
    }
}

fn io_err(e: std::io::Error) -> BlobStoreError {
    BlobStoreError::Other(e.to_string())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, path: &str) -> BlobResult<bool> {
        let p = self.resolve(path)?;
        Ok(tokio::fs::metadata(&p).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> BlobResult<()> {
        let p = self.resolve(path)?;
        Self::ensure_parent(&p).await?;
        tokio::fs::write(&p, bytes).await.map_err(io_err)
    }

    async fn get(&self, path: &str) -> BlobResult<Vec<u8>> {
        let p = self.resolve(path)?;
        match tokio::fs::read(&p).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(io_err(e)),
        }
    }

    async fn copy(&self, src: &str, dst: &str) -> BlobResult<()> {
        let (from, to) = (self.resolve(src)?, self.resolve(dst)?);
        if !self.exists(src).await? {
            return Err(BlobStoreError::NotFound(src.to_string()));
        }
        Self::ensure_parent(&to).await?;
        tokio::fs::copy(&from, &to).await.map_err(io_err)?;
        Ok(())
    }

    async fn move_to(&self, src: &str, dst: &str) -> BlobResult<()> {
        let (from, to) = (self.resolve(src)?, self.resolve(dst)?);
        if !self.exists(src).await? {
            return Err(BlobStoreError::NotFound(src.to_string()));
        }
        Self::ensure_parent(&to).await?;
        tokio::fs::rename(&from, &to).await.map_err(io_err)
    }

    async fn delete(&self, path: &str) -> BlobResult<()> {
        let p = self.resolve(path)?;
        match tokio::fs::remove_file(&p).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(e)),
            _ => Ok(()),
        }
    }

    async fn delete_directory(&self, prefix: &str) -> BlobResult<()> {
        let p = self.resolve(prefix.trim_end_matches('/'))?;
        match tokio::fs::remove_dir_all(&p).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(e)),
            _ => Ok(()),
        }
    }
}

pub async fn build_blob_store(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    match cfg {
        StorageConfig::Fs { root } => {
            info!(root = %root.display(), "using filesystem blob store");
            Ok(Arc::new(FsBlobStore::new(root.clone())))
        }
        StorageConfig::S3 { bucket, endpoint, region, access_key, secret_key } => {
            let store = S3BlobStore::new(
                bucket.clone(),
                endpoint.clone(),
                region.clone(),
                access_key.clone(),
                secret_key.clone(),
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
