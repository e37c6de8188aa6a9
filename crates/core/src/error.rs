//! Error types for the unredact core.

use thiserror::Error;

/// Category of a [`PdfError`], stable and free of internal detail.
///
/// This is what the surrounding transport layer should branch on: every
/// variant has a user-facing label, and [`ErrorKind::is_resource_limit`]
/// separates "file too complex" from "file corrupt".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedContainer,
    UnsupportedFeature,
    EncryptedDocument,
    MalformedPageTree,
    MalformedContentStream,
    InternalInvariantViolation,
    ResourceLimitExceeded,
}

impl ErrorKind {
    /// Short label used in user-visible messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::MalformedContainer => "malformed PDF container",
            Self::UnsupportedFeature => "unsupported PDF feature",
            Self::EncryptedDocument => "encrypted document",
            Self::MalformedPageTree => "malformed page tree",
            Self::MalformedContentStream => "malformed content stream",
            Self::InternalInvariantViolation => "internal error",
            Self::ResourceLimitExceeded => "resource limit exceeded",
        }
    }

    pub const fn is_resource_limit(self) -> bool {
        matches!(self, Self::ResourceLimitExceeded)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Primary error type for parsing and rewriting.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("document is encrypted")]
    EncryptedDocument,

    #[error("malformed page tree: {0}")]
    MalformedPageTree(String),

    #[error("malformed content stream: {0}")]
    MalformedContentStream(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
}

impl PdfError {
    /// Map this error to its reporting category.
    ///
    /// Lexer-level failures surface as container errors unless the caller
    /// re-labelled them with [`PdfError::in_content_stream`].
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenError { .. }
            | Self::UnexpectedEof
            | Self::TypeError { .. }
            | Self::MalformedContainer(_) => ErrorKind::MalformedContainer,
            Self::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Self::EncryptedDocument => ErrorKind::EncryptedDocument,
            Self::MalformedPageTree(_) => ErrorKind::MalformedPageTree,
            Self::MalformedContentStream(_) => ErrorKind::MalformedContentStream,
            Self::InternalInvariantViolation(_) => ErrorKind::InternalInvariantViolation,
            Self::ResourceLimitExceeded(_) => ErrorKind::ResourceLimitExceeded,
        }
    }

    /// Message safe to show to an end user: category only, no offsets.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::ResourceLimitExceeded => {
                "The file is too complex to process (resource limit exceeded).".to_string()
            }
            ErrorKind::EncryptedDocument => {
                "The file is encrypted; encrypted documents are not supported.".to_string()
            }
            kind => format!("The file could not be processed: {}.", kind.label()),
        }
    }

    /// Re-label a syntax failure raised while reading a content stream.
    pub fn in_content_stream(self) -> Self {
        match self {
            Self::TokenError { msg, .. } => Self::MalformedContentStream(msg),
            Self::UnexpectedEof => {
                Self::MalformedContentStream("unexpected end of content".into())
            }
            Self::TypeError { expected, got } => Self::MalformedContentStream(format!(
                "operand type: expected {expected}, got {got}"
            )),
            Self::MalformedContainer(msg) => Self::MalformedContentStream(msg),
            other => other,
        }
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
