//! # Error Taxonomy
//!
//! Every failure in ORRERY is one `Error` value: a closed `ErrorKind` tag,
//! a human message and an optional wrapped cause.
//!
//! ## Status Mapping
//!
//! ```text
//! not_found          -> 404     internal            -> 500
//! validation         -> 400     external            -> 503
//! conflict           -> 409     method_not_allowed  -> 405
//! unauthorized       -> 401
//! forbidden          -> 403
//! ```
//!
//! Wrapping keeps the whole cause chain; the HTTP boundary only ever looks
//! at the outermost kind.

use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Message carried by every cancellation error.
pub const CANCELLED_MESSAGE: &str = "operation cancelled";

/// Boxed cause attached to an [`Error`].
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Closed set of error tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The addressed record does not exist.
    NotFound,
    /// The input was rejected before touching any state.
    Validation,
    /// The request collides with the current state of a record.
    Conflict,
    /// Missing or rejected credentials.
    Unauthorized,
    /// Credentials are valid but not sufficient.
    Forbidden,
    /// Store failure, corruption, cancellation, or a bug.
    Internal,
    /// An upstream service (OAuth provider) failed.
    External,
    /// The route exists but not for this method.
    MethodNotAllowed,
}

impl ErrorKind {
    /// HTTP status code for this tag.
    #[inline]
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Internal => 500,
            Self::External => 503,
            Self::MethodNotAllowed => 405,
        }
    }

    /// Wire name of the tag.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal",
            Self::External => "external",
            Self::MethodNotAllowed => "method_not_allowed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged error with an optional cause chain.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    cancelled: bool,
    #[source]
    cause: Option<Cause>,
}

impl Error {
    /// Creates an error with the given tag and message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cancelled: false,
            cause: None,
        }
    }

    /// `not_found` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// `validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// `conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// `unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// `forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// `internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// `external` error.
    #[must_use]
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::External, message)
    }

    /// `method_not_allowed` error.
    #[must_use]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, message)
    }

    /// Cancellation failure. Tagged `internal`, recognisable through
    /// [`Error::is_cancelled`] even after wrapping.
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::internal(CANCELLED_MESSAGE)
        }
    }

    /// Attaches a cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Wraps `inner` under a new outer tag and message.
    #[must_use]
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, inner: Error) -> Self {
        Self::new(kind, message).with_cause(inner)
    }

    /// Wraps `self` under a new message, keeping its tag.
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Self {
        let kind = self.kind;
        Self::wrap(kind, message, self)
    }

    /// The outermost tag.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The outermost message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status for the outermost tag.
    #[inline]
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// True if this error or anything it wraps is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled {
            return true;
        }
        let mut source = self.cause.as_deref().map(|c| c as &(dyn StdError + 'static));
        while let Some(err) = source {
            if let Some(inner) = err.downcast_ref::<Error>() {
                if inner.cancelled {
                    return true;
                }
            }
            source = err.source();
        }
        false
    }
}

/// Result type used across ORRERY.
pub type Result<T> = std::result::Result<T, Error>;
