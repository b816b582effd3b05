//! Error types for acquisition
//!
//! This module provides the error taxonomy used throughout the library:
//! - Authorization errors (interactive consent required vs. outright denial)
//! - Network/API errors (non-2xx responses, malformed payloads)
//! - Account mismatch (authenticated identity not in the allow-list)
//! - Cancellation (user-initiated or triggered by an upstream failure)
//! - Packaging/upload errors (signing, PUT and notify failures)

use crate::cancel::CancelReason;
use thiserror::Error;

/// Result type alias for acquisition operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for acquisition
///
/// Each variant carries enough context to render a user-facing message; the
/// workflow surfaces `to_string()` of the error in its `error` stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.chunk_size")
        key: Option<String>,
    },

    /// Provider login/consent failed
    #[error("authorization error: {0}")]
    Auth(#[from] AuthError),

    /// Provider or backend API returned an unusable response
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The authenticated account is not in the allow-list
    #[error("wrong account: {email} is not one of the allowed accounts")]
    WrongAccount {
        /// The rejected canonical address
        email: String,
        /// The allow-list the address was checked against
        allowed: Vec<String>,
    },

    /// The run was cancelled
    #[error("cancelled: {0}")]
    Cancelled(CancelReason),

    /// Packaging, signing, upload or notify failed
    #[error("package error: {0}")]
    Package(#[from] PackageError),

    /// A workflow operation was invoked in a stage that does not accept it
    #[error("cannot {operation} while workflow is {stage}")]
    InvalidStage {
        /// The operation that was attempted (e.g., "start", "confirm upload")
        operation: String,
        /// The current stage that prevents the operation
        stage: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid URL built from configuration or returned by a provider
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Authorization errors raised by an [`Authorizer`](crate::auth::Authorizer)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Silent acquisition is impossible; an interactive consent flow is required
    ///
    /// Recovered locally by the workflow, never surfaced as a run failure.
    #[error("interaction required: {0}")]
    InteractionRequired(String),

    /// The user or the provider refused the login
    #[error("access denied: {0}")]
    Denied(String),

    /// The credential's expiry time has passed
    #[error("credential for {email} expired")]
    Expired {
        /// Account the expired credential belongs to
        email: String,
    },

    /// No authorizer is registered for the application
    #[error("no authorizer registered for {0}")]
    NotRegistered(String),
}

/// Errors from provider and backend HTTP APIs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Non-2xx HTTP response
    #[error("{url} returned status {status}: {body}")]
    Status {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("malformed response from {context}: {reason}")]
    Malformed {
        /// Which call produced the response
        context: String,
        /// What was wrong with it
        reason: String,
    },

    /// Backend answered with `{ ok: false }`
    #[error("backend rejected {0}")]
    Rejected(String),
}

/// Packaging and upload errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackageError {
    /// Signing service failed to produce an upload target
    #[error("signing {name} failed: {reason}")]
    SigningFailed {
        /// Package file name
        name: String,
        /// Why signing failed
        reason: String,
    },

    /// Object storage PUT failed
    #[error("upload of package {id} failed: {reason}")]
    UploadFailed {
        /// Package ID issued by the signing service
        id: String,
        /// Why the upload failed
        reason: String,
    },

    /// Notify call did not acknowledge the package
    #[error("notification for package {id} was not acknowledged")]
    NotifyRejected {
        /// Package ID issued by the signing service
        id: String,
    },

    /// Notify call failed outright
    #[error("notification for package {id} failed: {reason}")]
    NotifyFailed {
        /// Package ID issued by the signing service
        id: String,
        /// Why the call failed
        reason: String,
    },
}

/// Error categories, as surfaced to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Login/consent failures
    Authorization,
    /// Provider/backend network and API failures
    Network,
    /// Authenticated identity not allowed
    AccountMismatch,
    /// User-initiated or upstream-triggered cancellation
    Cancellation,
    /// Signing, upload and notify failures
    Packaging,
    /// Configuration and programming errors
    Internal,
}

impl Error {
    /// Create a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Api(ApiError::Malformed {
            context: context.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error is a cancellation of any reason
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Returns the cancellation reason, if this is a cancellation
    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Error::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }

    /// Returns true if silent authorization should escalate to an interactive flow
    pub fn requires_interaction(&self) -> bool {
        matches!(self, Error::Auth(AuthError::InteractionRequired(_)))
    }

    /// Map this error onto the UI-facing taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth(_) => ErrorCategory::Authorization,
            Error::Api(_) | Error::Network(_) | Error::Serialization(_) | Error::Url(_) => {
                ErrorCategory::Network
            }
            Error::WrongAccount { .. } => ErrorCategory::AccountMismatch,
            Error::Cancelled(_) => ErrorCategory::Cancellation,
            Error::Package(_) => ErrorCategory::Packaging,
            Error::Config { .. } | Error::InvalidStage { .. } | Error::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }
}
