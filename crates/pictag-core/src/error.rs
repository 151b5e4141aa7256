//! Error types for pictag

use std::fmt;

/// Result type alias using pictag's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pictag operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors (bad model identifier, unreadable config files)
    #[error("configuration error: {0}")]
    Config(String),

    /// Model loading errors
    #[error("model error: {0}")]
    Model(String),

    /// Preprocessing or forward pass errors
    #[error("inference error: {0}")]
    Inference(String),

    /// The client declared a content type the service does not accept
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Uploaded bytes could not be decoded as an image
    #[error("invalid image ({kind}): {detail}")]
    InvalidImage {
        kind: DecodeErrorKind,
        detail: String,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new unsupported media type error
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(content_type.into())
    }

    /// Create a new invalid image error
    pub fn invalid_image(kind: DecodeErrorKind, detail: impl Into<String>) -> Self {
        Self::InvalidImage {
            kind,
            detail: detail.into(),
        }
    }

    /// Whether the error was caused by the client's upload rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType(_) | Self::InvalidImage { .. }
        )
    }
}

/// Why an upload failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The buffer ended before the image was complete
    Truncated,
    /// The format could not be recognised or is not compiled in
    UnsupportedFormat,
    /// The header or pixel data is malformed
    Corrupt,
    /// Decoding would exceed the configured dimension or allocation limits
    LimitsExceeded,
}

impl DecodeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truncated => "truncated",
            Self::UnsupportedFormat => "unsupported_format",
            Self::Corrupt => "corrupt",
            Self::LimitsExceeded => "limits_exceeded",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
