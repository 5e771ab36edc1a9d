//! Media host uploads. Each local image is posted once and exchanged for a
//! public URL; failures propagate to the caller without retry.
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid file name: {0}")]
    InvalidName(PathBuf),
    #[error("media host unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("media host rejected upload {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("media host response has no secure_url")]
    MissingUrl,
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload one local file and return its publicly resolvable URL.
    async fn upload(&self, file: &Path) -> Result<String, UploadError>;
}

/// Unsigned uploads to a Cloudinary upload endpoint.
#[derive(Clone)]
pub struct CloudinaryUploader {
    http: Client,
    upload_url: Url,
    upload_preset: String,
}

impl fmt::Debug for CloudinaryUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryUploader")
            .field("upload_url", &self.upload_url)
            .field("upload_preset", &self.upload_preset)
            .finish_non_exhaustive()
    }
}

impl CloudinaryUploader {
    pub fn new(
        upload_url: Url,
        upload_preset: String,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let http = Client::builder()
            .user_agent("listaro-portal/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            upload_url,
            upload_preset,
        })
    }
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(&self, file: &Path) -> Result<String, UploadError> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::InvalidName(file.to_path_buf()))?
            .to_string();
        let content = fs::read(file).await.map_err(|source| UploadError::Read {
            path: file.to_path_buf(),
            source,
        })?;

        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name.clone())
            .mime_str(content_type_for(file))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        debug!(url=%self.upload_url, file=%file_name, "uploading image");
        let res = self
            .http
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, file=%file_name, "media host rejected upload");
            return Err(UploadError::Rejected { status, body });
        }

        let payload: UploadResponse = res.json().await?;
        let url = payload.secure_url.ok_or(UploadError::MissingUrl)?;
        info!(file=%file_name, url=%url, "uploaded image");
        Ok(url)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// MIME type sent with the multipart part, chosen by file extension.
pub fn content_type_for(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Rewrite a Cloudinary delivery URL to a scaled, auto-format variant for
/// display. Other hosts are returned unchanged.
pub fn optimize_image_url(url: &str) -> String {
    if url.contains("cloudinary.com") {
        url.replacen("/upload/", "/upload/c_scale,w_1280,q_auto,f_auto/", 1)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("dir/b.png")), "image/png");
        assert_eq!(content_type_for(Path::new("c.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn optimize_only_touches_cloudinary() {
        assert_eq!(
            optimize_image_url("https://res.cloudinary.com/demo/image/upload/v1/a.jpg"),
            "https://res.cloudinary.com/demo/image/upload/c_scale,w_1280,q_auto,f_auto/v1/a.jpg"
        );
        assert_eq!(
            optimize_image_url("https://cdn.example/upload/a.jpg"),
            "https://cdn.example/upload/a.jpg"
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let uploader = CloudinaryUploader::new(
            Url::parse("https://api.cloudinary.com/v1_1/demo/image/upload").unwrap(),
            "preset".into(),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = uploader
            .upload(Path::new("/definitely/not/here.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }
}
