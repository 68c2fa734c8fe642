//! Media intake
//!
//! - **validate**: name/extension/size policy for selected files; the only
//!   way to obtain a [`MediaFile`]
//! - **encode**: async conversion of an accepted file into a base64 data URL

pub mod encode;
pub mod validate;

pub use encode::{encode, EncodedPayload, EncodingFailed};
pub use validate::{
    validate, FileCandidate, MediaContent, MediaFile, ValidationError, ValidationOutcome,
    VideoFormat, ACCEPTED_EXTENSIONS, MAX_UPLOAD_BYTES,
};
