//! Upload validation.
//!
//! Gates every selected file before it can enter a session. Checks run in a
//! fixed order and stop at the first failure:
//!
//! 1. the file has a non-empty name
//! 2. the name carries an extension
//! 3. the extension is one of `mp4`, `mov`, `avi` (case-insensitive)
//! 4. the byte size does not exceed [`MAX_UPLOAD_BYTES`]
//!
//! A [`MediaFile`] can only be obtained through [`validate`], so holding one
//! means the checks above passed.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted upload, in bytes (20 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Extensions accepted by the file picker and the validator.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Reasons a selected file is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid file: the selected file has no name")]
    InvalidFile,

    #[error("the file name has no extension; expected .mp4, .mov or .avi")]
    MissingExtension,

    #[error("unsupported format '.{0}'; please upload an MP4, MOV or AVI video")]
    UnsupportedFormat(String),

    #[error("file is too large ({size} bytes); the maximum is {max} bytes (20 MB)")]
    FileTooLarge { size: u64, max: u64 },
}

impl ValidationError {
    /// Stable tag used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidFile => "InvalidFile",
            ValidationError::MissingExtension => "MissingExtension",
            ValidationError::UnsupportedFormat(_) => "UnsupportedFormat",
            ValidationError::FileTooLarge { .. } => "FileTooLarge",
        }
    }
}

/// Container formats the analyzer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    Mp4,
    Mov,
    Avi,
}

impl VideoFormat {
    /// Match a bare extension (no dot), ignoring case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(VideoFormat::Mp4),
            "mov" => Some(VideoFormat::Mov),
            "avi" => Some(VideoFormat::Avi),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mov => "mov",
            VideoFormat::Avi => "avi",
        }
    }

    /// Media type sent alongside the inline video data: always `video/<ext>`.
    pub fn request_mime(&self) -> String {
        format!("video/{}", self.extension())
    }
}

/// Where the bytes of a file live.
#[derive(Debug, Clone)]
pub enum MediaContent {
    /// Uploaded through the browser and held in memory.
    Memory(Bytes),
    /// A local file, read lazily at encode time.
    Disk(PathBuf),
}

/// A file as selected, before any checks.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: Option<String>,
    pub size: u64,
    pub content: MediaContent,
}

impl FileCandidate {
    /// Candidate for bytes received over HTTP.
    ///
    /// `size` is passed separately because oversized uploads are only read up
    /// to the ceiling plus one byte.
    pub fn from_upload(name: Option<String>, size: u64, bytes: Bytes) -> Self {
        Self {
            name,
            size,
            content: MediaContent::Memory(bytes),
        }
    }

    /// Candidate for a file on disk. Only metadata is read here.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self {
            name,
            size: meta.len(),
            content: MediaContent::Disk(path.to_path_buf()),
        })
    }
}

/// A file that passed validation.
#[derive(Debug, Clone)]
pub struct MediaFile {
    name: String,
    format: VideoFormat,
    size: u64,
    content: MediaContent,
}

impl MediaFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content(&self) -> &MediaContent {
        &self.content
    }
}

/// Result of checking one selection.
#[derive(Debug)]
pub enum ValidationOutcome {
    Accepted(MediaFile),
    Rejected(ValidationError),
}

impl ValidationOutcome {
    pub fn into_result(self) -> Result<MediaFile, ValidationError> {
        match self {
            ValidationOutcome::Accepted(file) => Ok(file),
            ValidationOutcome::Rejected(err) => Err(err),
        }
    }
}

/// Check a candidate against the upload policy.
pub fn validate(candidate: FileCandidate) -> ValidationOutcome {
    match check(candidate.name.as_deref(), candidate.size) {
        Ok(format) => ValidationOutcome::Accepted(MediaFile {
            // check() rejects a missing name
            name: candidate.name.unwrap_or_default(),
            format,
            size: candidate.size,
            content: candidate.content,
        }),
        Err(err) => ValidationOutcome::Rejected(err),
    }
}

/// Name and size rules, in evaluation order.
fn check(name: Option<&str>, size: u64) -> Result<VideoFormat, ValidationError> {
    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => return Err(ValidationError::InvalidFile),
    };

    let (_, ext) = name
        .rsplit_once('.')
        .ok_or(ValidationError::MissingExtension)?;

    let format = VideoFormat::from_extension(ext)
        .ok_or_else(|| ValidationError::UnsupportedFormat(ext.to_ascii_lowercase()))?;

    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }

    Ok(format)
}
