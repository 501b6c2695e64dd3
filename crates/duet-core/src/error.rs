//! Error types for the duet protocol core.
//!
//! Strongly-typed errors for the two things the core validates: endpoint
//! input and session state transitions. Transport failures never appear here;
//! the driver reports them to the state machine as stream events instead.

use thiserror::Error;

use crate::session::SessionState;

/// Errors that can occur during session state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Local nickname is empty after trimming
    #[error("nickname must not be empty")]
    EmptyNickname,

    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Errors produced while parsing an [`Endpoint`](crate::Endpoint).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Address is not an IP literal
    #[error("invalid IP address '{0}'")]
    InvalidAddress(String),

    /// Port is not a number in `0..=65535`
    #[error("invalid port '{0}'")]
    InvalidPort(String),

    /// Input has no `:port` suffix
    #[error("missing port in '{0}'")]
    MissingPort(String),
}
