//! Error taxonomy for the persistence core.
//!
//! One enum covers every failure class the stack reports:
//!
//! - [`Error::InvalidStatement`] — builder misuse (missing FROM, no
//!   assignments, columns and AS SELECT at once, ...). Raised synchronously,
//!   never retried.
//! - [`Error::Operational`] — a driver/native execution failure, wrapped with
//!   the original message.
//! - [`Error::SchemaIncompatible`] — the live database structure disagrees
//!   with the object model after an upgrade. Fatal for the connection
//!   attempt.
//! - [`Error::Configuration`] — malformed or contradictory connection
//!   settings, including a dialect/version mismatch.
//! - [`Error::Validation`] — an attribute write violates a type, not-null,
//!   or relation constraint.
//! - [`Error::CommitFailed`] — a transaction commit failed; the transaction
//!   has already been rolled back when this is observed.

use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors reported by the persistence core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A statement builder was used incorrectly.
    InvalidStatement(String),
    /// A driver or native execution failure.
    Operational(String),
    /// The live DB schema disagrees with the registered object model.
    SchemaIncompatible(String),
    /// Connection settings are malformed or contradictory.
    Configuration(String),
    /// An attribute write violated a constraint.
    Validation(String),
    /// Commit failed after the transaction was rolled back.
    CommitFailed(String),
}

impl Error {
    /// Builder-misuse error.
    pub fn invalid_statement(msg: impl Into<String>) -> Self {
        Error::InvalidStatement(msg.into())
    }

    /// Driver failure, carrying the native message.
    pub fn operational(msg: impl Into<String>) -> Self {
        Error::Operational(msg.into())
    }

    /// Live schema does not match the object model.
    pub fn schema_incompatible(msg: impl Into<String>) -> Self {
        Error::SchemaIncompatible(msg.into())
    }

    /// Bad or contradictory configuration.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Attribute validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Short, stable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidStatement(_) => "invalid-statement",
            Error::Operational(_) => "operational",
            Error::SchemaIncompatible(_) => "schema-incompatible",
            Error::Configuration(_) => "configuration",
            Error::Validation(_) => "validation",
            Error::CommitFailed(_) => "commit-failed",
        }
    }

    /// The wrapped message.
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidStatement(m)
            | Error::Operational(m)
            | Error::SchemaIncompatible(m)
            | Error::Configuration(m)
            | Error::Validation(m)
            | Error::CommitFailed(m) => m,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for Error {}
