//! Task attachment model.
//!
//! # Responsibility
//! - Validate uploaded files against the size cap and MIME allow-list.
//! - Encode file content as a self-describing data URL stored inline with the
//!   task record.
//!
//! # Invariants
//! - `size` is the decoded byte length and never exceeds `MAX_ATTACHMENT_BYTES`.
//! - `data` always has the form `data:<mime>;base64,<payload>`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Upload cap per attachment (5 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// MIME types accepted for task attachments.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
];

const SIZE_UNITS: [&str; 3] = ["Bytes", "KB", "MB"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    TooLarge { name: String, size: u64 },
    UnsupportedType { name: String, mime_type: String },
    InvalidPayload(String),
}

impl Display for AttachmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge { name, .. } => {
                write!(f, "File \"{name}\" is too large. Maximum size is 5MB.")
            }
            Self::UnsupportedType { mime_type, .. } => {
                write!(f, "File type \"{mime_type}\" is not supported.")
            }
            Self::InvalidPayload(message) => write!(f, "invalid attachment payload: {message}"),
        }
    }
}

impl Error for AttachmentError {}

/// Coarse attachment category used for icon selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
    Other,
}

/// File attached to a task, stored inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    /// Decoded content length in bytes.
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Data URL carrying the base64-encoded content.
    pub data: String,
}

impl Attachment {
    /// Validates and encodes raw file content.
    ///
    /// # Errors
    /// - `TooLarge` when `bytes` exceeds `MAX_ATTACHMENT_BYTES`.
    /// - `UnsupportedType` when `mime_type` is not in `ALLOWED_MIME_TYPES`.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, AttachmentError> {
        let name = name.into();
        let mime_type = mime_type.into();
        let size = bytes.len() as u64;
        check_upload(&name, &mime_type, size)?;

        let data = format!("data:{mime_type};base64,{}", STANDARD.encode(bytes));
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            size,
            mime_type,
            data,
        })
    }

    /// Re-checks size and type rules, e.g. for attachments decoded from storage.
    pub fn validate(&self) -> Result<(), AttachmentError> {
        check_upload(&self.name, &self.mime_type, self.size)
    }

    /// Decodes the data URL back into raw bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, AttachmentError> {
        let rest = self
            .data
            .strip_prefix("data:")
            .ok_or_else(|| AttachmentError::InvalidPayload("missing `data:` prefix".to_string()))?;
        let (_, payload) = rest.split_once(";base64,").ok_or_else(|| {
            AttachmentError::InvalidPayload("missing `;base64,` marker".to_string())
        })?;
        STANDARD
            .decode(payload)
            .map_err(|err| AttachmentError::InvalidPayload(err.to_string()))
    }

    pub fn kind(&self) -> AttachmentKind {
        let mime = self.mime_type.as_str();
        if mime.starts_with("image/") {
            AttachmentKind::Image
        } else if mime == "application/pdf" || mime == "text/plain" || mime.contains("word") {
            AttachmentKind::Document
        } else {
            AttachmentKind::Other
        }
    }

    pub fn human_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// Checks one upload candidate before it is read.
pub fn check_upload(name: &str, mime_type: &str, size: u64) -> Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            name: name.to_string(),
            size,
        });
    }
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(AttachmentError::UnsupportedType {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
        });
    }
    Ok(())
}

/// Formats a byte count as `Bytes`, `KB` or `MB` with at most one decimal.
///
/// A trailing `.0` is dropped (`1024` → `1 KB`, `1536` → `1.5 KB`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let rounded = (scaled * 10.0).round() / 10.0;
    let number = if rounded.fract() == 0.0 {
        format!("{}", rounded as u64)
    } else {
        format!("{rounded:.1}")
    };
    format!("{number} {}", SIZE_UNITS[unit])
}
