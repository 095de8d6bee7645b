use std::fmt;
use std::path::Path;

use image::ImageFormat;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Storage key of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Deterministic per-subject key; re-enrolling overwrites the reference.
    pub fn enrollment(employee_id: &str) -> AppResult<Self> {
        let employee_id = validate_employee_id(employee_id)?;
        Ok(Self(format!("enroll/{employee_id}/reference.jpg")))
    }

    /// Fresh random key for every gate capture.
    pub fn gate_capture() -> Self {
        Self(format!("gate/capture-{}.jpg", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim an employee identifier and reject values that cannot form one
/// path segment of an object key.
pub fn validate_employee_id(raw: &str) -> AppResult<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InputMissing("employee id".into()));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(AppError::InvalidEmployeeId {
            employee_id: trimmed.to_string(),
            message: "must not contain path separators".into(),
        });
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::InvalidEmployeeId {
            employee_id: trimmed.to_string(),
            message: "must not be a relative path component".into(),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(AppError::InvalidEmployeeId {
            employee_id: trimmed.escape_debug().to_string(),
            message: "must not contain control characters".into(),
        });
    }
    Ok(trimmed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    pub const JPEG: &'static str = "image/jpeg";

    pub fn jpeg() -> Self {
        Self(Self::JPEG.to_string())
    }

    pub fn from_path(path: &Path) -> AppResult<Self> {
        let format = ImageFormat::from_path(path)
            .map_err(|_| AppError::UnsupportedContentType(path.display().to_string()))?;
        let mime = match format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            _ => return Err(AppError::UnsupportedContentType(path.display().to_string())),
        };
        Ok(Self(mime.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image bytes plus the content type they will be uploaded with.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, content_type: ContentType) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}
