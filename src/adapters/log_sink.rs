//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing completions and session changes to
//! the `log` facade.  The runner pairs it with [`JsonLineSink`] so events
//! are both logged and printed.

use std::io::Write;

use log::{info, warn};
use serde_json::{Value, json};

use crate::app::events::{ControllerEvent, SessionEvent};
use crate::app::ports::EventSink;
use crate::error::SessionError;

/// Adapter that logs every [`ControllerEvent`].
pub struct LogCompletionSink;

impl LogCompletionSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogCompletionSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogCompletionSink {
    fn emit(&mut self, event: &ControllerEvent) {
        match event {
            ControllerEvent::Completed(c) => match &c.result {
                Ok(Some(v)) => info!("DONE  | #{} value={}", c.id, v),
                Ok(None) => info!("DONE  | #{}", c.id),
                Err(e) => warn!("FAIL  | #{} {}", c.id, e),
            },
            ControllerEvent::Session(SessionEvent::Opened { transport }) => {
                info!("SESSN | open on {}", transport);
            }
            ControllerEvent::Session(SessionEvent::OpenFailed(e)) => {
                warn!("SESSN | open failed: {}", e);
            }
            ControllerEvent::Session(SessionEvent::Closed) => info!("SESSN | closed"),
            ControllerEvent::Session(SessionEvent::LivenessLost) => {
                warn!("SESSN | closed: {}", SessionError::LivenessLost);
            }
        }
    }
}

/// Render an event as one JSON object.
pub fn event_json(event: &ControllerEvent) -> Value {
    match event {
        ControllerEvent::Completed(c) => match &c.result {
            Ok(value) => json!({"id": c.id, "ok": true, "value": value}),
            Err(e) => json!({"id": c.id, "ok": false, "error": e.to_string()}),
        },
        ControllerEvent::Session(SessionEvent::Opened { transport }) => {
            json!({"session": "opened", "transport": transport})
        }
        ControllerEvent::Session(SessionEvent::OpenFailed(e)) => {
            json!({"session": "open-failed", "error": e.to_string()})
        }
        ControllerEvent::Session(SessionEvent::Closed) => json!({"session": "closed"}),
        ControllerEvent::Session(SessionEvent::LivenessLost) => {
            json!({"session": "liveness-lost", "error": SessionError::LivenessLost.to_string()})
        },
    }
}

/// Writes each event as a JSON line, and logs it.
pub struct JsonLineSink<W: Write> {
    out: W,
    log: LogCompletionSink,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            log: LogCompletionSink::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for JsonLineSink<W> {
    fn emit(&mut self, event: &ControllerEvent) {
        self.log.emit(event);
        if let Err(e) = writeln!(self.out, "{}", event_json(event)) {
            warn!("JsonLineSink: write failed: {}", e);
        }
    }
}
