//! Fuzz target: JSON action requests through `Controller::submit_json`
//!
//! Arbitrary bytes that parse as JSON are submitted to a fresh controller
//! backed by the simulated board.  The controller must never panic, and
//! the RGB gate must agree with the channel flags afterwards.
//!
//! cargo fuzz run fuzz_action_request

#![no_main]

use botlink::adapters::sim_board::SimBoard;
use botlink::app::service::Controller;
use botlink::config::ControllerConfig;
use botlink::drivers::rgb_led::Channel;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let mut board = SimBoard::new();
    let mut controller = Controller::new(ControllerConfig::default());
    let requests = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    for (i, req) in requests.iter().enumerate() {
        let now = i as u64 * 50;
        let _ = controller.submit_json(req, now, &mut board);
        while let Some(ev) = board.pop_event() {
            controller.on_board_event(ev, &mut board);
        }
        controller.poll(now, &mut board);
    }

    let any = Channel::ALL.iter().any(|c| controller.rgb().is_driven(*c));
    assert_eq!(controller.rgb().gate_enabled(), any, "gate out of sync with channels");
});
