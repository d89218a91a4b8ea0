//! Server-wide error type with Redis-compatible error codes.
//!
//! Every error carries a code prefix (the first word of the wire error
//! frame), a human message, an optional underlying cause, a transient flag,
//! and structured key-value context for logging.

use std::error::Error as StdError;
use std::fmt;

/// Redis-compatible error code prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Generic client-visible error.
    Err,
    /// Operation against a key holding the wrong kind of value.
    WrongType,
    /// Malformed RESP frame or command line.
    Syntax,
    /// Temporary overload or admission rejection (transient).
    Busy,
    /// An I/O deadline was exceeded (transient).
    Timeout,
    /// Unexpected server-side failure.
    Internal,
    /// Key not found; mapped to a null reply at the command layer.
    NotFound,
    /// Key deleted at the requested version; mapped to a null reply.
    Deleted,
    /// Requested version does not exist; mapped to a null reply.
    VersionNotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Err => "ERR",
            ErrorCode::WrongType => "WRONGTYPE",
            ErrorCode::Syntax => "SYNTAX",
            ErrorCode::Busy => "BUSY",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::NotFound => "NOTFOUND",
            ErrorCode::Deleted => "DELETED",
            ErrorCode::VersionNotFound => "VERSIONNOTFOUND",
        }
    }

    /// Transient codes represent conditions the client may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCode::Busy | ErrorCode::Timeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The base error type for Verdis.
#[derive(Debug)]
pub struct VerdisError {
    code: ErrorCode,
    message: String,
    cause: Option<Box<dyn StdError + Send + Sync>>,
    transient: bool,
    context: Vec<(&'static str, String)>,
}

impl VerdisError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        VerdisError {
            code,
            message: message.into(),
            cause: None,
            transient: code.is_transient(),
            context: Vec::new(),
        }
    }

    /// Wrap an underlying error with a code and message.
    pub fn wrap(
        cause: impl StdError + Send + Sync + 'static,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        let mut err = VerdisError::new(code, message);
        err.cause = Some(Box::new(cause));
        err
    }

    /// Attach a key-value pair for structured logging.
    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Override the transient classification.
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// The wire form of the error, without the leading `-`.
    pub fn to_resp(&self) -> String {
        format!("{} {}", self.code.as_str(), self.message)
    }
}

impl fmt::Display for VerdisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code.as_str(), self.message)?;
        for (key, value) in &self.context {
            write!(f, " {key}={value}")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl StdError for VerdisError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings() {
        assert_eq!(ErrorCode::Err.as_str(), "ERR");
        assert_eq!(ErrorCode::VersionNotFound.as_str(), "VERSIONNOTFOUND");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ErrorCode::Busy.is_transient());
        assert!(ErrorCode::Timeout.is_transient());
        assert!(!ErrorCode::Err.is_transient());
        assert!(!ErrorCode::Internal.is_transient());
    }

    #[test]
    fn test_resp_rendering() {
        let err = VerdisError::new(ErrorCode::Err, "unknown command 'NOPE'");
        assert_eq!(err.to_resp(), "ERR unknown command 'NOPE'");
    }

    #[test]
    fn test_context_and_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let err = VerdisError::wrap(io, ErrorCode::Timeout, "read deadline exceeded")
            .with("peer", "127.0.0.1:51000");
        assert!(err.is_transient());
        assert_eq!(err.context().len(), 1);
        let rendered = err.to_string();
        assert!(rendered.contains("TIMEOUT"));
        assert!(rendered.contains("peer=127.0.0.1:51000"));
        assert!(rendered.contains("read timed out"));
    }

    #[test]
    fn test_transient_override() {
        let err = VerdisError::new(ErrorCode::Err, "overloaded").transient(true);
        assert!(err.is_transient());
    }
}
