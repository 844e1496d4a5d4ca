//! Media CDN providers for the creator-upload flow.
//!
//! The CDN accepts a raw video blob plus a destination folder and returns a
//! canonical secure URL; thumbnails are derived from that URL (a first-frame
//! transform), never uploaded separately.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::{ApiError, Result};

/// Result of a successful media upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Canonical HTTPS URL of the uploaded asset.
    pub secure_url: String,
    /// CDN-side identifier (folder-qualified).
    pub public_id: String,
}

/// Derive the poster-frame URL for a canonical video URL.
///
/// Inserts the first-frame transform after the upload segment and swaps the
/// container extension for a still-image one.
pub fn derive_thumbnail_url(video_url: &str) -> String {
    let with_frame = video_url.replacen("/upload/", "/upload/so_0/", 1);
    match with_frame.rsplit_once('.') {
        // Only swap a real file extension, not a dot inside the host name.
        Some((stem, ext)) if !ext.contains('/') => format!("{stem}.jpg"),
        _ => format!("{with_frame}.jpg"),
    }
}

#[async_trait]
pub trait MediaCdn: Send + Sync {
    /// Upload the video file at `local_path` into `folder`.
    async fn upload_video(&self, local_path: &Path, folder: &str) -> Result<UploadedMedia>;

    fn thumbnail_url(&self, video_url: &str) -> String {
        derive_thumbnail_url(video_url)
    }
}

#[derive(Debug, Deserialize)]
struct UploadRow {
    secure_url: String,
    public_id: String,
}

/// Unsigned multipart upload against the hosted CDN.
pub struct RestCdn {
    http: reqwest::Client,
    base_url: Url,
    upload_preset: String,
}

impl RestCdn {
    pub fn new(cdn_url: &str, upload_preset: &str) -> Result<Self> {
        let normalized = if cdn_url.ends_with('/') {
            cdn_url.to_string()
        } else {
            format!("{cdn_url}/")
        };

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&normalized)?,
            upload_preset: upload_preset.to_string(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.cdn_url, &config.cdn_upload_preset)
    }
}

#[async_trait]
impl MediaCdn for RestCdn {
    async fn upload_video(&self, local_path: &Path, folder: &str) -> Result<UploadedMedia> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.mp4")
            .to_string();

        let bytes = tokio::fs::read(local_path).await?;
        tracing::info!(file = %file_name, size = bytes.len(), folder, "uploading video to CDN");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder.to_string());

        let resp = self
            .http
            .post(self.base_url.join("video/upload")?)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let row: UploadRow = resp.json().await?;
        Ok(UploadedMedia {
            secure_url: row.secure_url,
            public_id: row.public_id,
        })
    }
}

/// In-memory CDN stand-in. Never touches the filesystem, so tests can pass
/// paths that do not exist.
#[derive(Default)]
pub struct MemoryCdn {
    fail_uploads: Mutex<bool>,
}

impl MemoryCdn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        match self.fail_uploads.lock() {
            Ok(mut guard) => *guard = fail,
            Err(poisoned) => *poisoned.into_inner() = fail,
        }
    }

    fn should_fail(&self) -> bool {
        match self.fail_uploads.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl MediaCdn for MemoryCdn {
    async fn upload_video(&self, _local_path: &Path, folder: &str) -> Result<UploadedMedia> {
        if self.should_fail() {
            return Err(ApiError::Status {
                status: 500,
                message: "injected upload failure".into(),
            });
        }

        let public_id = format!("{folder}/{}", Uuid::new_v4());
        Ok(UploadedMedia {
            secure_url: format!("https://cdn.lookym.test/upload/{public_id}.mp4"),
            public_id,
        })
    }
}
