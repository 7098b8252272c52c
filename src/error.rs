//! Error types for preview pipelines.

use std::fmt;

use thiserror::Error;

/// Every way a preview pipeline run can fail.
///
/// `MalformedPart` is absorbed by the presentation reader and never ends a
/// run; every other variant terminates the run it occurred in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreviewError {
    /// The document's bytes could not be read.
    #[error("unreadable source: {0}")]
    UnreadableSource(String),

    /// The bytes are not a well-formed container for the detected format.
    #[error("not a valid container: {0}")]
    InvalidContainer(String),

    /// The presentation archive has no slide folder.
    #[error("no slide parts found")]
    NoSlidePartsFound,

    /// One inner part could not be decoded.
    #[error("malformed part {name}: {reason}")]
    MalformedPart { name: String, reason: String },

    /// A page failed to render; the whole batch is abandoned.
    #[error("rasterization failed on page {page}: {reason}")]
    RasterizationFailed { page: u32, reason: String },

    /// The conversion service failed or answered with something unusable.
    #[error("remote conversion failed: {0}")]
    RemoteConversionFailed(String),

    /// No strategy can handle this document.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The run was superseded by a newer one before it finished.
    #[error("superseded by a newer preview run")]
    Cancelled,
}

/// Reason category shown to the user alongside a failed preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    UnreadableSource,
    InvalidContainer,
    NoSlidePartsFound,
    MalformedPart,
    RasterizationFailed,
    RemoteConversionFailed,
    UnsupportedFormat,
    Cancelled,
}

impl PreviewError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PreviewError::UnreadableSource(_) => ErrorCategory::UnreadableSource,
            PreviewError::InvalidContainer(_) => ErrorCategory::InvalidContainer,
            PreviewError::NoSlidePartsFound => ErrorCategory::NoSlidePartsFound,
            PreviewError::MalformedPart { .. } => ErrorCategory::MalformedPart,
            PreviewError::RasterizationFailed { .. } => ErrorCategory::RasterizationFailed,
            PreviewError::RemoteConversionFailed(_) => ErrorCategory::RemoteConversionFailed,
            PreviewError::UnsupportedFormat(_) => ErrorCategory::UnsupportedFormat,
            PreviewError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Message for the preview area: category first, then detail.
    pub fn user_message(&self) -> String {
        format!("Preview unavailable ({}): {}", self.category(), self)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::UnreadableSource => "UnreadableSource",
            ErrorCategory::InvalidContainer => "InvalidContainer",
            ErrorCategory::NoSlidePartsFound => "NoSlidePartsFound",
            ErrorCategory::MalformedPart => "MalformedPart",
            ErrorCategory::RasterizationFailed => "RasterizationFailed",
            ErrorCategory::RemoteConversionFailed => "RemoteConversionFailed",
            ErrorCategory::UnsupportedFormat => "UnsupportedFormat",
            ErrorCategory::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, PreviewError>;
