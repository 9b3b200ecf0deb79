//! Errors carrying a numeric code.
//!
//! Calling CLIs map the code to a process exit status. The engine only
//! attaches whatever code the caller hands it; what a given code means is
//! the caller's business.

use std::fmt;

/// Numeric error code attached to a [`CodedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    /// The raw numeric value
    pub fn value(self) -> u32 {
        self.0
    }

    /// Convert to a process exit status.
    ///
    /// Exit statuses are a single byte on Unix; codes above 255 saturate so a
    /// failure never wraps around to a success.
    pub fn exit_status(self) -> u8 {
        u8::try_from(self.0).unwrap_or(u8::MAX)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

/// An error tagged with a numeric code and wrapping its cause.
///
/// Renders as `ERROR[<code>] <cause>`.
#[derive(Debug)]
pub struct CodedError {
    code: ErrorCode,
    cause: anyhow::Error,
}

impl CodedError {
    /// Build an error from a code and a message
    pub fn new(code: impl Into<ErrorCode>, message: impl fmt::Display) -> Self {
        Self {
            code: code.into(),
            cause: anyhow::anyhow!("{message}"),
        }
    }

    /// Wrap an existing error under a code
    pub fn wrap(code: impl Into<ErrorCode>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            code: code.into(),
            cause: cause.into(),
        }
    }

    /// The error code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The wrapped cause
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR[{}] {}", self.code, self.cause)
    }
}

impl std::error::Error for CodedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let err = CodedError::new(4321u32, "test-error");
        assert_eq!(err.to_string(), "ERROR[4321] test-error");
    }

    #[test]
    fn test_code_and_cause() {
        let err = CodedError::new(ErrorCode(9999), format!("unexpected error: {}", "some error"));
        assert_eq!(err.code(), ErrorCode(9999));
        assert_eq!(err.cause().to_string(), "unexpected error: some error");
    }

    #[test]
    fn test_wrap_keeps_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CodedError::wrap(3u32, io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("no such file"));
    }

    #[test]
    fn test_exit_status_saturates() {
        assert_eq!(ErrorCode(1).exit_status(), 1);
        assert_eq!(ErrorCode(255).exit_status(), 255);
        assert_eq!(ErrorCode(4321).exit_status(), 255);
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = CodedError::new(7u32, "boom").into();
        let coded = err.downcast_ref::<CodedError>().map(CodedError::code);
        assert_eq!(coded, Some(ErrorCode(7)));
    }
}
