//! Fuzz target: arbitrary board event streams
//!
//! Decodes the input into reports, command replies, and link signals and
//! feeds them to an open controller with pending reads.  Every pending
//! read must complete at most once.
//!
//! cargo fuzz run fuzz_board_events

#![no_main]

use std::collections::HashSet;

use botlink::adapters::sim_board::{LinkBehavior, SimBoard};
use botlink::app::events::ControllerEvent;
use botlink::app::ports::ReportCategory;
use botlink::app::service::Controller;
use botlink::config::ControllerConfig;
use botlink::events::BoardEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut board = SimBoard::new();
    board.set_link(LinkBehavior::Silent);
    let mut controller = Controller::new(ControllerConfig::default());
    let _ = controller.open("fuzz", 0, &mut board);
    controller.on_board_event(BoardEvent::LinkUp, &mut board);

    for port in ["K0", "K1", "K2", "K3", "M0"] {
        let _ = controller.submit_json(&serde_json::json!({"name": "analog-read", "port": port}), 0, &mut board);
    }

    let mut seen = HashSet::new();
    for (i, chunk) in data.chunks(4).enumerate() {
        let &[kind, pin, hi, lo] = chunk else { break };
        let value = u16::from_be_bytes([hi, lo]);
        let event = match kind % 5 {
            0 => BoardEvent::Report { category: ReportCategory::Analog, pin, value },
            1 => BoardEvent::Report { category: ReportCategory::Digital, pin, value },
            2 => BoardEvent::CommandReply { command: pin, value: i32::from(value) },
            3 => BoardEvent::VersionReply,
            _ => BoardEvent::LinkFailed(String::new()),
        };
        controller.on_board_event(event, &mut board);
        controller.poll(i as u64 * 10, &mut board);

        while let Some(ev) = controller.next_event() {
            if let ControllerEvent::Completed(c) = ev {
                assert!(seen.insert(c.id), "request {} completed twice", c.id);
            }
        }
    }
});
