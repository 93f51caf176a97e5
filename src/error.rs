//! Error types for the control core.
//!
//! One enum per surface: actions, sessions, configuration.  Unresolved
//! ports and malformed action fields are deliberately *not* errors; they
//! turn into no-ops or neutral readings inside the handlers.

use core::fmt;

// ---------------------------------------------------------------------------
// Action errors
// ---------------------------------------------------------------------------

/// Failure of a single action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The request named an action the dispatcher does not know.
    UnknownAction(String),
    /// A newer read on the same slot replaced this pending request.
    Superseded,
    /// The session closed while the request was still pending.
    Cancelled,
    /// The completion queue has no room left for another pending request.
    QueueFull,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAction(name) => write!(f, "unknown action \"{name}\""),
            Self::Superseded => write!(f, "superseded by a newer read on the same slot"),
            Self::Cancelled => write!(f, "cancelled by session close"),
            Self::QueueFull => write!(f, "completion queue full, drain events and retry"),
        }
    }
}

impl std::error::Error for ActionError {}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `open` while a session is opening or open.
    AlreadyOpen,
    /// `open` without a transport identifier.
    MissingTransport,
    /// The link did not come up within the open timeout.
    Timeout,
    /// The board reported a connection failure.
    ConnectFailed(String),
    /// Too many consecutive liveness probes went unanswered.
    LivenessLost,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyOpen => write!(f, "session already open"),
            Self::MissingTransport => write!(f, "no transport identifier given"),
            Self::Timeout => write!(f, "timed out opening board connection"),
            Self::ConnectFailed(reason) => write!(f, "board connection failed: {reason}"),
            Self::LivenessLost => write!(f, "board stopped answering liveness probes"),
        }
    }
}

impl std::error::Error for SessionError {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation; names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(field) => write!(f, "validation failed: {field}"),
        }
    }
}

impl std::error::Error for ConfigError {}
