//! Library-wide error and result types.
//!
//! Errors carry one of four canonical codes - `InvalidArgument`,
//! `FailedPrecondition`, `ResourceExhausted`, `Internal` - mirroring the
//! taxonomy a distributed caller already reasons about (retry `Internal`,
//! never retry `InvalidArgument`). One documented case additionally carries
//! a typed, URI-keyed payload so downstream code can match on it without
//! parsing the message.

use std::fmt;
use std::io;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, machine-readable tag for errors that carry structured payload
/// data beyond their message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPayload {
    /// `InnerProduct`/`Database::inner_product_with` was called with
    /// `max_len == 0`.
    MaxValueSizeIsZero,
}

impl ErrorPayload {
    /// Stable URI identifying this payload type, suitable for matching
    /// across process/language boundaries.
    pub const fn uri(&self) -> &'static str {
        match self {
            ErrorPayload::MaxValueSizeIsZero => "https://dpf-pir.dev/errors/max-value-size-is-zero",
        }
    }
}

/// All errors this crate can produce.
#[derive(Debug)]
pub enum Error {
    /// A caller-detectable precondition was violated (size mismatch,
    /// oversize value, non-positive `max_len`, insufficient selection
    /// bits, ...).
    InvalidArgument {
        message: String,
        payload: Option<ErrorPayload>,
    },
    /// An object was used in the wrong lifecycle state (e.g. `Builder::build`
    /// called a second time).
    FailedPrecondition(String),
    /// An aligned allocation failed.
    ResourceExhausted(String),
    /// An impossible state was reached (buffer reallocated after
    /// precomputation, cipher library returned an unexpected size, ...).
    Internal(String),
    /// An underlying I/O operation failed while reading/writing wire data.
    Io(io::Error),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
            payload: None,
        }
    }

    pub fn invalid_argument_with_payload(message: impl Into<String>, payload: ErrorPayload) -> Self {
        Error::InvalidArgument {
            message: message.into(),
            payload: Some(payload),
        }
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Error::FailedPrecondition(message.into())
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Error::ResourceExhausted(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// The structured payload carried by this error, if any.
    pub fn payload(&self) -> Option<ErrorPayload> {
        match self {
            Error::InvalidArgument { payload, .. } => *payload,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument { message, .. } => write!(f, "invalid argument: {message}"),
            Error::FailedPrecondition(m) => write!(f, "failed precondition: {m}"),
            Error::ResourceExhausted(m) => write!(f, "resource exhausted: {m}"),
            Error::Internal(m) => write!(f, "internal error: {m}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_the_error() {
        let err = Error::invalid_argument_with_payload("max_len is zero", ErrorPayload::MaxValueSizeIsZero);
        assert_eq!(err.payload(), Some(ErrorPayload::MaxValueSizeIsZero));
        assert_eq!(
            err.payload().unwrap().uri(),
            "https://dpf-pir.dev/errors/max-value-size-is-zero"
        );
    }

    #[test]
    fn plain_invalid_argument_has_no_payload() {
        let err = Error::invalid_argument("size mismatch");
        assert!(err.payload().is_none());
    }
}
