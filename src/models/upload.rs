use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

text_enum! {
    /// Top-level folder the uploaded object lands in.
    pub enum UploadPurpose {
        Club => "CLUB",
        Post => "POST",
        Challenge => "CHALLENGE",
        Avatar => "AVATAR",
    }
}

impl UploadPurpose {
    pub fn folder(&self) -> &'static str {
        match self {
            UploadPurpose::Club => "clubs",
            UploadPurpose::Post => "posts",
            UploadPurpose::Challenge => "challenges",
            UploadPurpose::Avatar => "avatars",
        }
    }
}

/// MIME types accepted by the media pipeline.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "video/mp4",
];

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL (POST /upload/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "meet_photo.jpg")]
    pub filename: String,
    /// The MIME type the upload will be constrained to.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
    pub purpose: UploadPurpose,
}

impl PresignedUrlRequest {
    pub fn validate(&self) -> AppResult<()> {
        if !ALLOWED_CONTENT_TYPES.contains(&self.file_type.as_str()) {
            return Err(AppError::validation(format!(
                "unsupported file type: {}",
                self.file_type
            )));
        }
        Ok(())
    }

    /// Lowercased extension of `filename`, restricted to ASCII alphanumerics.
    /// Falls back to "bin".
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(|ext| {
                ext.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
                    .to_ascii_lowercase()
            })
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// PresignedUrlResponse
///
/// The time-limited PUT URL and the object key to reference afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}
