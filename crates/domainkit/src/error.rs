//! Error types for domain configuration operations.
//!
//! Errors are categorized so callers can tell a connection problem from a
//! held edit lock or a rejected configuration write, and give the operator
//! appropriate feedback. Rollback and cleanup failures have their own
//! variant but are only ever logged, never returned from the provisioning
//! flow.

use std::fmt;

use crate::types::ProvisionStep;

/// Result type alias for domain configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of domain configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The administrative session could not be established.
    Connection,
    /// Another edit session holds the configuration lock.
    Lock,
    /// The management server rejected or failed a configuration operation.
    Remote,
    /// Releasing a session or discarding edits failed.
    Cleanup,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Cannot reach the administration server",
            Self::Lock => "Configuration is locked by another edit session",
            Self::Remote => "The administration server rejected a configuration change",
            Self::Cleanup => "Cleanup failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connection => "Check the admin URL, that the server is running, and the credentials",
            Self::Lock => "Wait for the other session to activate or cancel its edits, then run again",
            Self::Remote => "Check the server log; all staged edits from this run were discarded",
            Self::Cleanup => "Check the server for a lingering edit session",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a domain's configuration tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Opening the administrative session failed (unreachable or rejected).
    #[error("cannot connect to {endpoint}: {message}")]
    Connection {
        /// Admin endpoint that was dialled.
        endpoint: String,
        /// Why the connection failed.
        message: String,
    },

    /// The exclusive edit lock is held by another session.
    #[error("edit lock unavailable: {0}")]
    EditLockUnavailable(String),

    /// A step inside an open edit session failed; staged edits were discarded.
    #[error("provisioning failed while {step}: {source}")]
    Provisioning {
        /// Step that was running when the failure happened.
        step: ProvisionStep,
        /// The original failure.
        #[source]
        source: Box<Error>,
    },

    /// Closing the session or discarding edits failed.
    #[error("cleanup failed: {0}")]
    Cleanup(String),

    /// A configuration operation was rejected by the server.
    #[error("{operation} failed: {message}")]
    Remote {
        /// Operation that failed.
        operation: &'static str,
        /// Message reported by the server.
        message: String,
    },

    /// An entity referenced by name does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Entity kind, e.g. "server".
        kind: &'static str,
        /// Name that was looked up.
        name: String,
    },

    /// HTTP transport failure talking to the management API.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The management API answered with something we could not read.
    #[error("invalid management response: {0}")]
    InvalidResponse(String),

    /// The admin URL could not be parsed or uses an unsupported scheme.
    #[error("invalid admin endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The session was already closed.
    #[error("administrative session is closed")]
    SessionClosed,
}

impl Error {
    /// Create a connection error.
    pub fn connection(endpoint: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Create a remote operation error.
    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Tag this error with the provisioning step it interrupted.
    ///
    /// An error that is already tagged keeps its original step.
    #[must_use]
    pub fn during(self, step: ProvisionStep) -> Self {
        match self {
            Self::Provisioning { .. } => self,
            other => Self::Provisioning {
                step,
                source: Box::new(other),
            },
        }
    }

    /// The failure that started it all, unwrapping provisioning context.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Provisioning { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Step during which the error happened, if it was raised inside an edit session.
    #[must_use]
    pub fn step(&self) -> Option<ProvisionStep> {
        match self {
            Self::Provisioning { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connection { .. } | Error::SessionClosed | Error::InvalidEndpoint(_) => {
                ErrorCategory::Connection
            }
            Error::EditLockUnavailable(_) => ErrorCategory::Lock,
            Error::Provisioning { source, .. } => source.category(),
            Error::Cleanup(_) => ErrorCategory::Cleanup,
            Error::Remote { .. } | Error::NotFound { .. } => ErrorCategory::Remote,
            Error::Http { status: Some(_), .. } => ErrorCategory::Remote,
            Error::Http { status: None, .. } => ErrorCategory::Connection,
            Error::InvalidResponse(_) => ErrorCategory::Other,
        }
    }
}

#[cfg(feature = "rest")]
impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(feature = "rest")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
