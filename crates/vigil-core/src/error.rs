//! Shared error types across vigil crates.

use std::error::Error as StdError;
use std::fmt::Write;

use serde::Serialize;
use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed configuration.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Unified error type used by core and gateway startup paths.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl VigilError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            VigilError::BadRequest(_) => ClientCode::BadRequest,
            VigilError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            VigilError::Internal(_) => ClientCode::Internal,
        }
    }
}

/// An anticipated failure that already knows its HTTP status and carries a
/// message that is safe to show the caller.
///
/// Handlers return this for validation failures and similar conditions. The
/// error normalizer passes it through untouched.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
    pub is_operational: bool,
    pub stack: Option<String>,
}

impl ApiError {
    /// Operational error with the given status and message.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            is_operational: true,
            stack: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// Flag the error as unexpected (programmer error) while keeping its status.
    pub fn programmer(mut self) -> Self {
        self.is_operational = false;
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// The single shape every request failure is reduced to before it is logged
/// and rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedError {
    pub status_code: u16,
    pub message: String,
    pub is_operational: bool,
    pub stack: Option<String>,
}

impl NormalizedError {
    /// Message exposed for every failure that was not already an `ApiError`.
    pub const INTERNAL_MESSAGE: &'static str = "Internal Server Error";

    /// Generic 500 wrapping an unexpected failure.
    pub fn internal(stack: Option<String>) -> Self {
        Self {
            status_code: 500,
            message: Self::INTERNAL_MESSAGE.to_string(),
            is_operational: false,
            stack,
        }
    }

    /// Normalize an arbitrary error.
    ///
    /// A top-level `ApiError` keeps its status, message and flag. Everything
    /// else becomes a 500 whose stack is the rendered source chain of the
    /// original error.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        match err.downcast_ref::<ApiError>() {
            Some(api) => Self::from(api),
            None => Self::internal(Some(error_chain(err))),
        }
    }
}

impl From<&ApiError> for NormalizedError {
    fn from(err: &ApiError) -> Self {
        Self {
            status_code: err.status_code,
            message: err.message.clone(),
            is_operational: err.is_operational,
            stack: err.stack.clone(),
        }
    }
}

impl From<ApiError> for NormalizedError {
    fn from(err: ApiError) -> Self {
        Self {
            status_code: err.status_code,
            message: err.message,
            is_operational: err.is_operational,
            stack: err.stack,
        }
    }
}

/// Render an error and its `source()` chain, one cause per line.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = format!("Error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n    caused by: {cause}");
        source = cause.source();
    }
    out
}
