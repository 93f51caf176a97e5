//! Inbound board events.
//!
//! Events are produced by the board adapter (value reports, command
//! replies, link state, version replies) and fed one at a time into
//! [`Controller::on_board_event`](crate::app::service::Controller::on_board_event).
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ Pin reports │────▶│              │     │ Sensor registry  │
//! │ Cmd replies │────▶│  Controller  │────▶│ Session          │
//! │ Link state  │────▶│  (consumer)  │     │ Completion queue │
//! └─────────────┘     └──────────────┘     └──────────────────┘
//! ```

use crate::app::ports::ReportCategory;

/// Everything the board can push back to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Periodic value report for an enabled pin.
    Report {
        category: ReportCategory,
        pin: u8,
        value: u16,
    },
    /// Reply to a vendor command frame, keyed by its command id.
    CommandReply { command: u8, value: i32 },
    /// The link requested by `open_link` is up.
    LinkUp,
    /// The link requested by `open_link` could not be established.
    LinkFailed(String),
    /// Answer to `query_version`.
    VersionReply,
}
