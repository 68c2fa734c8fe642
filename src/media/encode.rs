//! Data URL encoding of accepted files.
//!
//! The encoder produces `data:<mime>;base64,<payload>`. The `<mime>` tag is
//! guessed from the file name and may differ from the media type used in the
//! outbound request (`.mov` is tagged `video/quicktime` here but sent as
//! `video/mov`). Downstream code only uses the part after the first comma.

use base64::Engine;
use thiserror::Error;

use super::validate::{MediaContent, MediaFile};

/// Reading or encoding the file bytes failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to encode video: {0}")]
pub struct EncodingFailed(pub String);

/// A file in transmissible text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    data_url: String,
    mime_type: String,
}

impl EncodedPayload {
    pub(crate) fn new(data_url: String, mime_type: String) -> Self {
        Self {
            data_url,
            mime_type,
        }
    }

    /// The full `data:` URL as produced by the encoder.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Media type for the request, `video/<ext>`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw base64 payload: everything after the first comma of the data URL.
    pub fn data(&self) -> &str {
        self.data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or("")
    }
}

/// Encode a file's full contents. Disk-backed files are read here.
pub async fn encode(file: &MediaFile) -> Result<EncodedPayload, EncodingFailed> {
    let bytes = match file.content() {
        MediaContent::Memory(bytes) => bytes.clone(),
        MediaContent::Disk(path) => tokio::fs::read(path)
            .await
            .map(bytes::Bytes::from)
            .map_err(|e| EncodingFailed(format!("failed to read {}: {e}", path.display())))?,
    };

    let tag = mime_guess::from_path(file.name())
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    // A 20 MB clip is ~27 MB of base64; keep that off the async workers.
    let data_url = tokio::task::spawn_blocking(move || {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        format!("data:{tag};base64,{b64}")
    })
    .await
    .map_err(|e| EncodingFailed(format!("encoder task failed: {e}")))?;

    tracing::debug!(
        file = %file.name(),
        bytes = file.size(),
        encoded_len = data_url.len(),
        "Encoded video payload"
    );

    Ok(EncodedPayload::new(data_url, file.format().request_mime()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::validate::{validate, FileCandidate};
    use bytes::Bytes;

    fn memory_file(name: &str, data: &'static [u8]) -> MediaFile {
        validate(FileCandidate::from_upload(
            Some(name.to_string()),
            data.len() as u64,
            Bytes::from_static(data),
        ))
        .into_result()
        .unwrap()
    }

    #[tokio::test]
    async fn test_encode_memory_file() {
        let payload = encode(&memory_file("clip.mp4", b"hello")).await.unwrap();
        assert_eq!(payload.data_url(), "data:video/mp4;base64,aGVsbG8=");
        assert_eq!(payload.data(), "aGVsbG8=");
        assert_eq!(payload.mime_type(), "video/mp4");
    }

    #[tokio::test]
    async fn test_data_url_tag_differs_from_request_mime() {
        let payload = encode(&memory_file("clip.MOV", b"x")).await.unwrap();
        assert!(payload.data_url().starts_with("data:video/quicktime;base64,"));
        assert_eq!(payload.mime_type(), "video/mov");
        assert_eq!(payload.data(), "eA==");
    }

    #[tokio::test]
    async fn test_encode_empty_file() {
        let payload = encode(&memory_file("empty.avi", b"")).await.unwrap();
        assert_eq!(payload.data(), "");
        assert_eq!(payload.mime_type(), "video/avi");
    }

    #[tokio::test]
    async fn test_encode_disk_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smash.mp4");
        tokio::fs::write(&path, [0u8, 1, 2, 3]).await.unwrap();

        let file = validate(FileCandidate::from_path(&path).await.unwrap())
            .into_result()
            .unwrap();
        let payload = encode(&file).await.unwrap();
        assert_eq!(payload.data(), "AAECAw==");
    }

    #[tokio::test]
    async fn test_unreadable_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();
        let file = validate(FileCandidate::from_path(&path).await.unwrap())
            .into_result()
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let err = encode(&file).await.unwrap_err();
        assert!(err.0.contains("gone.mp4"), "unexpected message: {err}");
    }

    #[test]
    fn test_data_splits_at_first_comma_only() {
        let payload = EncodedPayload::new(
            "data:video/mp4;base64,abc,def".to_string(),
            "video/mp4".to_string(),
        );
        assert_eq!(payload.data(), "abc,def");
    }
}
