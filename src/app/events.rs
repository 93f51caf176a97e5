//! Outbound controller events.
//!
//! The [`Controller`](super::service::Controller) queues these on its
//! completion channel.  The caller drains them with
//! [`Controller::next_event`](super::service::Controller::next_event) and
//! hands them to whatever front end issued the requests.

use crate::error::{ActionError, SessionError};

/// Identifier handed out for every request that completes asynchronously.
pub type RequestId = u32;

/// Final result of an asynchronous request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub id: RequestId,
    /// `Ok(Some(v))` for reads, `Ok(None)` for actuator actions.
    pub result: Result<Option<f64>, ActionError>,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The link came up and the board was initialised.
    Opened { transport: String },
    /// The open attempt failed or timed out; the session is closed.
    OpenFailed(SessionError),
    /// The session was closed on request.
    Closed,
    /// The session was dropped after unanswered liveness probes.
    LivenessLost,
}

/// Everything the controller reports back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Completed(Completion),
    Session(SessionEvent),
}
