//! Rewrap error taxonomy
//!
//! Every failure crossing the service boundary is a [`RewrapError`]: an RPC
//! status [`Code`] plus a short, deliberately generic message. The precise
//! cause is logged where it happens and never carried outward.

use std::fmt;
use thiserror::Error;

/// RPC status codes a rewrap can end with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Unavailable,
    Internal,
    Cancelled,
    DeadlineExceeded,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        match self {
            Code::InvalidArgument => "invalid_argument",
            Code::Unauthenticated => "unauthenticated",
            Code::PermissionDenied => "permission_denied",
            Code::NotFound => "not_found",
            Code::Unavailable => "unavailable",
            Code::Internal => "internal",
            Code::Cancelled => "canceled",
            Code::DeadlineExceeded => "deadline_exceeded",
        }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            Code::InvalidArgument
            | Code::Unauthenticated
            | Code::PermissionDenied
            | Code::NotFound
            | Code::Cancelled => ErrorKind::User,
            Code::Unavailable | Code::Internal | Code::DeadlineExceeded => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whose fault a failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, failed signature, binding or access checks
    User,
    /// Backend, crypto or infrastructure fault
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::User => f.write_str("request error"),
            ErrorKind::Internal => f.write_str("internal error"),
        }
    }
}

/// Error returned to rewrap callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.kind())]
pub struct RewrapError {
    code: Code,
    message: &'static str,
}

impl RewrapError {
    pub fn new(code: Code, message: &'static str) -> Self {
        Self { code, message }
    }

    pub fn invalid_argument(message: &'static str) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Generic rejection shared by every binding, policy and unwrap failure
    pub fn bad_request() -> Self {
        Self::invalid_argument("bad request")
    }

    pub fn unauthenticated(message: &'static str) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    pub fn forbidden() -> Self {
        Self::new(Code::PermissionDenied, "forbidden")
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn unavailable() -> Self {
        Self::new(Code::Unavailable, "service unavailable")
    }

    pub fn internal() -> Self {
        Self::new(Code::Internal, "internal error")
    }

    pub fn cancelled() -> Self {
        Self::new(Code::Cancelled, "request canceled")
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(Code::DeadlineExceeded, "deadline exceeded")
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Stable identifier for clients and metrics
    pub fn error_code(&self) -> &'static str {
        match self.code {
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::Unauthenticated => "UNAUTHENTICATED",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::NotFound => "NOT_FOUND",
            Code::Unavailable => "UNAVAILABLE",
            Code::Internal => "INTERNAL",
            Code::Cancelled => "CANCELLED",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.code {
            Code::InvalidArgument => 400,
            Code::Unauthenticated => 401,
            Code::PermissionDenied => 403,
            Code::NotFound => 404,
            Code::Unavailable => 503,
            Code::Internal => 500,
            Code::Cancelled => 499,
            Code::DeadlineExceeded => 504,
        }
    }

    /// The caller may retry after a delay
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, Code::Unavailable | Code::DeadlineExceeded)
    }
}
