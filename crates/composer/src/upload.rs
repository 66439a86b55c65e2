//! Image upload adapter.
//!
//! Turns a file picked inside an image block into a remote URL the block can
//! use as its source. Files are checked locally (size and sniffed content
//! type) before any bytes leave the process; the transfer itself is a single
//! multipart POST with no retry.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info};
use url::Url;

use crate::block::render::is_safe_url;
use crate::error::UploadError;
use crate::http::ApiClient;

/// Image types the image tool accepts.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Upload route name the image tool registers under.
pub const IMAGE_UPLOADER_ROUTE: &str = "imageUploader";

/// A file selected through a block's UI, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    pub async fn read(path: &Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { name, bytes })
    }
}

/// Outcome of one upload, in the shape the image tool consumes:
/// `{ "success": 1, "file": { "url": "..." } }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub success: bool,
    pub resource_url: String,
}

impl UploadResult {
    pub fn uploaded(resource_url: impl Into<String>) -> Self {
        Self {
            success: true,
            resource_url: resource_url.into(),
        }
    }
}

impl Serialize for UploadResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct FileUrl<'a> {
            url: &'a str,
        }

        #[derive(Serialize)]
        struct Wire<'a> {
            success: u8,
            file: FileUrl<'a>,
        }

        Wire {
            success: u8::from(self.success),
            file: FileUrl {
                url: &self.resource_url,
            },
        }
        .serialize(serializer)
    }
}

/// Uploader capability handed to the image tool.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload a file the user selected.
    async fn upload_by_file(&self, file: LocalFile) -> Result<UploadResult, UploadError>;

    /// Use an already-hosted image. No transfer happens.
    async fn upload_by_url(&self, url: &str) -> Result<UploadResult, UploadError> {
        if is_safe_url(url) {
            Ok(UploadResult::uploaded(url.trim()))
        } else {
            Err(UploadError::InvalidUrl(url.to_string()))
        }
    }
}

/// Check a file before upload. Returns the sniffed MIME type.
pub fn check_file(file: &LocalFile, max_bytes: usize) -> Result<&'static str, UploadError> {
    if file.bytes.is_empty() {
        return Err(UploadError::Empty);
    }

    if file.bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: file.bytes.len(),
            max: max_bytes,
        });
    }

    let mime = infer::get(&file.bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");

    if !ALLOWED_IMAGE_TYPES.contains(&mime) {
        return Err(UploadError::UnsupportedType(mime.to_string()));
    }

    Ok(mime)
}

/// Upload endpoint response: `{ "fileUrl": ... }` or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    One(UploadedFile),
    Many(Vec<UploadedFile>),
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    #[serde(rename = "fileUrl")]
    file_url: String,
}

impl UploadResponse {
    fn into_url(self) -> Option<String> {
        let file = match self {
            UploadResponse::One(file) => Some(file),
            UploadResponse::Many(files) => files.into_iter().next(),
        };
        file.map(|f| f.file_url).filter(|url| !url.is_empty())
    }
}

/// Uploader that posts to the community API's upload endpoint.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: Url,
    max_bytes: usize,
}

impl HttpUploader {
    /// Create an uploader for `path` on the API.
    pub fn new(api: &ApiClient, path: &str, max_bytes: usize) -> anyhow::Result<Self> {
        let endpoint = api
            .endpoint(path)
            .with_context(|| format!("invalid upload path: {path}"))?;
        Ok(Self {
            client: api.client().clone(),
            endpoint,
            max_bytes,
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload_by_file(&self, file: LocalFile) -> Result<UploadResult, UploadError> {
        let mime = check_file(&file, self.max_bytes)?;
        let size = file.bytes.len();
        debug!(filename = %file.name, mime, size, "uploading file");

        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.name.clone())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new()
            .text("route", IMAGE_UPLOADER_ROUTE)
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }

        let body: UploadResponse = response.json().await?;
        let url = body.into_url().ok_or(UploadError::MissingUrl)?;

        info!(filename = %file.name, url = %url, "file uploaded");
        Ok(UploadResult::uploaded(url))
    }
}
