// src/error.rs
//! Error taxonomy for the credential lifecycle front end.
//!
//! Variants carry plain messages rather than source errors (`Timeout` carries
//! nothing and displays as `timeout`), so an error can
//! be cloned into a cached-fallback listing and logged without holding on
//! to transport handles. A failed verification is not an error: it is a terminal
//! [`Outcome::Invalid`](crate::models::verification::Outcome) instead.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error outputs from the lifecycle components.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A local precondition failed; nothing was sent to the authority.
    #[error("{0}")]
    Validation(String),

    /// Reading from the authority failed; cached data is still served.
    #[error("could not refresh credentials: {0}")]
    FetchFailed(String),

    /// The authority declined to issue a credential.
    #[error("{0}")]
    IssuanceRejected(String),

    /// The authority declined to generate a presentation.
    #[error("{0}")]
    GenerationRejected(String),

    /// No confirmed credential or presentation exists under the name.
    #[error("{0}")]
    NotFound(String),

    /// A selected credential has no confirmed payload to bundle.
    #[error("credential {0} has no confirmed payload")]
    UnresolvedCredential(String),

    /// The request never produced an HTTP response.
    #[error("network_error: {0}")]
    Transport(String),

    /// The authority did not answer within the configured bound.
    #[error("timeout")]
    Timeout,

    /// Settings could not be loaded or are unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Fieldless classification of [`Error`], used to pick response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::FetchFailed`].
    FetchFailed,
    /// See [`Error::IssuanceRejected`].
    IssuanceRejected,
    /// See [`Error::GenerationRejected`].
    GenerationRejected,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::UnresolvedCredential`].
    UnresolvedCredential,
    /// See [`Error::Transport`] and [`Error::Timeout`].
    Transport,
    /// See [`Error::Config`].
    Config,
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::FetchFailed(_) => ErrorKind::FetchFailed,
            Error::IssuanceRejected(_) => ErrorKind::IssuanceRejected,
            Error::GenerationRejected(_) => ErrorKind::GenerationRejected,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::UnresolvedCredential(_) => ErrorKind::UnresolvedCredential,
            Error::Transport(_) | Error::Timeout => ErrorKind::Transport,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Shorthand for a [`Error::Validation`] with the given message.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
