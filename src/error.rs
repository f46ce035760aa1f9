//! Error types shared by every layer of the navigator.
//!
//! Each error carries a stable code, a human message, an optional cause and a
//! free-form context map. Two errors compare equal when their codes match.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Closed set of failure categories with stable string codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AccessibilityDenied,
    AccessibilityFailed,
    ElementNotFound,
    InvalidConfig,
    InvalidInput,
    OverlayFailed,
    HintGenerationFailed,
    ActionFailed,
    ContextCanceled,
    Timeout,
    Internal,
}

impl ErrorCode {
    /// Stable identifier used in logs and IPC replies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AccessibilityDenied => "ACCESSIBILITY_DENIED",
            ErrorCode::AccessibilityFailed => "ACCESSIBILITY_FAILED",
            ErrorCode::ElementNotFound => "ELEMENT_NOT_FOUND",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::OverlayFailed => "OVERLAY_FAILED",
            ErrorCode::HintGenerationFailed => "HINT_GENERATION_FAILED",
            ErrorCode::ActionFailed => "ACTION_FAILED",
            ErrorCode::ContextCanceled => "CONTEXT_CANCELED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Domain error with code, message, optional cause and context.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxedCause>,
    context: BTreeMap<String, String>,
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Wraps an underlying cause with a domain code.
    pub fn wrap<E>(cause: E, code: ErrorCode, message: impl Into<String>) -> Self
    where
        E: Into<BoxedCause>,
    {
        Self {
            code,
            message: message.into(),
            source: Some(cause.into()),
            context: BTreeMap::new(),
        }
    }

    pub fn canceled() -> Self {
        Self::new(ErrorCode::ContextCanceled, "operation canceled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Adds a context entry and returns the error for chaining.
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    /// Errors caused by the user's input or configuration.
    pub fn is_user_error(&self) -> bool {
        matches!(self.code, ErrorCode::InvalidConfig | ErrorCode::InvalidInput)
    }

    /// Errors that may clear up on their own if the flow is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self.code, ErrorCode::Timeout | ErrorCode::AccessibilityFailed)
    }

    pub fn is_cancellation(&self) -> bool {
        self.code == ErrorCode::ContextCanceled
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::internal("lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn equality_is_by_code() {
        let a = Error::new(ErrorCode::InvalidInput, "first");
        let b = Error::new(ErrorCode::InvalidInput, "second");
        let c = Error::new(ErrorCode::ActionFailed, "first");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = Error::new(ErrorCode::OverlayFailed, "window gone");
        assert_eq!(err.to_string(), "[OVERLAY_FAILED] window gone");
    }

    #[test]
    fn wrap_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = Error::wrap(io, ErrorCode::InvalidConfig, "read config");
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk".to_string()));
    }

    #[test]
    fn classification_helpers() {
        assert!(Error::new(ErrorCode::InvalidConfig, "").is_user_error());
        assert!(Error::new(ErrorCode::InvalidInput, "").is_user_error());
        assert!(!Error::new(ErrorCode::Internal, "").is_user_error());
        assert!(Error::new(ErrorCode::Timeout, "").is_transient());
        assert!(!Error::new(ErrorCode::AccessibilityDenied, "").is_transient());
        assert!(Error::canceled().is_cancellation());
    }

    #[test]
    fn context_is_recorded() {
        let err = Error::new(ErrorCode::ElementNotFound, "gone").with_context("label", "AS");
        assert_eq!(err.context().get("label").map(String::as_str), Some("AS"));
    }
}
