//! Error types for subscription-core
//!
//! A single error enum covers the failure surface of this crate: header
//! values the core cannot read, and replies the enclosing dialog fails to
//! send. Dispatch keeps its boolean contract; errors are carried where a
//! caller can actually act on them.

use thiserror::Error;

/// A type alias for handling `Result`s with `SubscriptionError`
pub type Result<T> = std::result::Result<T, SubscriptionError>;

/// Errors that can occur in subscription handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// A header value could not be parsed
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// A header required by the protocol was absent
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// An unknown or unsupported SIP method
    #[error("Invalid SIP method: {0}")]
    InvalidMethod(String),

    /// The dialog failed to send a response
    #[error("Reply failed: {0}")]
    ReplyFailed(String),
}
