//! Image storage on the local filesystem.
//!
//! Files live under `<root>/<bucket>/` and are served by the router below
//! the public base URL.

use crate::core::AppError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    ProfilePics,
    GroupPics,
}

impl Bucket {
    pub fn dir_name(self) -> &'static str {
        match self {
            Bucket::ProfilePics => "profile-pics",
            Bucket::GroupPics => "group-pics",
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            Bucket::ProfilePics => 5 * 1024 * 1024,
            Bucket::GroupPics => 2 * 1024 * 1024,
        }
    }
}

/// An image received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl Upload {
    fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));
        match from_name {
            Some(ext) => ext.to_ascii_lowercase(),
            None => self
                .content_type
                .strip_prefix("image/")
                .filter(|sub| sub.chars().all(|c| c.is_ascii_alphanumeric()))
                .unwrap_or("bin")
                .to_string(),
        }
    }
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Rejects non-images and files over the bucket limit.
    pub fn check(&self, bucket: Bucket, upload: &Upload) -> Result<(), AppError> {
        if !upload.content_type.starts_with("image/") {
            warn!(content_type = %upload.content_type, "Upload is not an image");
            return Err(AppError::bad_request("Only image uploads are accepted")
                .with_details(format!("got {}", upload.content_type)));
        }
        if upload.bytes.is_empty() {
            return Err(AppError::bad_request("Uploaded file is empty"));
        }
        if upload.bytes.len() > bucket.max_bytes() {
            warn!(size = upload.bytes.len(), ?bucket, "Upload too large");
            return Err(AppError::bad_request("Image is too large").with_details(format!(
                "limit is {} MB",
                bucket.max_bytes() / (1024 * 1024)
            )));
        }
        Ok(())
    }

    /// Stores the image and returns its public URL.
    #[instrument(skip(self, upload), fields(size = upload.bytes.len()))]
    pub async fn upload(
        &self,
        bucket: Bucket,
        owner_id: &str,
        upload: &Upload,
    ) -> Result<String, AppError> {
        self.check(bucket, upload)?;

        let owner: String = owner_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let file_name = format!(
            "{owner}-{}.{}",
            Utc::now().timestamp_millis(),
            upload.extension()
        );
        let dir = self.root.join(bucket.dir_name());

        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::internal_server_error("Could not store image").with_details(e.to_string())
        })?;
        fs::write(dir.join(&file_name), &upload.bytes)
            .await
            .map_err(|e| {
                AppError::internal_server_error("Could not store image")
                    .with_details(e.to_string())
            })?;

        let url = format!("{}/{}/{}", self.public_base_url, bucket.dir_name(), file_name);
        info!(%url, "Image stored");
        Ok(url)
    }

    /// Removes a previously stored image. Never fails: problems are logged.
    #[instrument(skip(self))]
    pub async fn delete(&self, bucket: Bucket, url: &str) {
        let prefix = format!("{}/{}/", self.public_base_url, bucket.dir_name());
        let Some(file_name) = url.strip_prefix(&prefix) else {
            debug!("Image not managed by this store, skipping");
            return;
        };
        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            warn!("Refusing to delete suspicious image path");
            return;
        }
        match fs::remove_file(self.root.join(bucket.dir_name()).join(file_name)).await {
            Ok(()) => debug!("Image deleted"),
            Err(e) => warn!(error = %e, "Could not delete image"),
        }
    }
}
