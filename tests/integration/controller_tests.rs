//! Integration tests for request dispatch against the recording mock.
//!
//! Covers the port table edge cases, the RGB gate coupling, the DC motor
//! mode table, synchronized servo motion, and one-shot sensor reads.

use serde_json::json;

use botlink::app::events::Completion;
use botlink::app::ports::{Level, PinMode, ReportCategory};
use botlink::app::service::{Controller, Dispatch};
use botlink::config::ControllerConfig;
use botlink::drivers::dc_motor::{MotorMode, MotorState};
use botlink::error::ActionError;
use botlink::events::BoardEvent;
use botlink::frames;
use botlink::pins::{LED_B_PIN, LED_FET_PIN, LED_G_PIN, LED_R_PIN};

use crate::mock_board::{BoardCall, MockBoard, drain};

fn setup() -> (Controller, MockBoard) {
    (Controller::new(ControllerConfig::default()), MockBoard::new())
}

fn send(c: &mut Controller, board: &mut MockBoard, req: serde_json::Value) -> Dispatch {
    let now = c.now_ms();
    c.submit_json(&req, now, board).expect("request should be accepted")
}

fn pending(d: Dispatch) -> u32 {
    match d {
        Dispatch::Pending(id) => id,
        other => panic!("expected pending, got {other:?}"),
    }
}

// ── Unresolved ports ──────────────────────────────────────────

#[test]
fn unknown_port_writes_are_no_ops() {
    let (mut c, mut board) = setup();
    for req in [
        json!({"name": "digital-write", "port": "X9", "value": 1}),
        json!({"name": "led", "port": "X9", "on": true}),
        json!({"name": "buzzer", "port": "X9", "on": true, "frequency": 200}),
        json!({"name": "motor-power", "port": "X9", "power": 50}),
        json!({"name": "motor-mode", "port": "X9", "mode": "brake"}),
        json!({"name": "motor-direction", "port": "X9", "direction": "backward"}),
        json!({"name": "servo-degree", "port": "X9", "degree": 30}),
    ] {
        assert_eq!(send(&mut c, &mut board, req), Dispatch::Done(None));
    }
    assert!(board.calls.is_empty(), "got {:?}", board.calls);
}

#[test]
fn unknown_port_reads_are_zero() {
    let (mut c, mut board) = setup();
    for name in ["digital-read", "analog-read", "read-button", "read-light", "accelerometer-read"] {
        assert_eq!(
            send(&mut c, &mut board, json!({"name": name, "port": "X9", "axis": "x"})),
            Dispatch::Done(Some(0.0)),
            "{name}"
        );
    }
    assert!(board.calls.is_empty());
}

// ── RGB gate coupling ─────────────────────────────────────────

#[test]
fn gate_follows_any_channel_on() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "led", "port": "LED_R", "on": true}));
    send(&mut c, &mut board, json!({"name": "led", "port": "LED_B", "on": true}));
    send(&mut c, &mut board, json!({"name": "led", "port": "LED_R", "on": false}));
    assert_eq!(board.last_level(LED_FET_PIN), Some(Level::Active));
    assert_eq!(board.last_level(LED_R_PIN), Some(Level::Inactive));

    send(&mut c, &mut board, json!({"name": "led", "port": "LED_B", "on": false}));
    assert_eq!(board.last_level(LED_FET_PIN), Some(Level::Inactive));
    assert!(!c.rgb().gate_enabled());
}

#[test]
fn multi_led_all_zero_turns_everything_off() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "multi-led", "r": 80, "g": 20, "b": 0}));
    assert_eq!(board.last_level(LED_FET_PIN), Some(Level::Active));
    assert_eq!(board.last_analog(LED_R_PIN), Some(255 - 204));
    assert_eq!(board.last_analog(LED_G_PIN), Some(255 - 51));

    send(&mut c, &mut board, json!({"name": "multi-led", "r": 0, "g": 0, "b": 0}));
    assert_eq!(board.last_level(LED_FET_PIN), Some(Level::Inactive));
    for pin in [LED_R_PIN, LED_G_PIN, LED_B_PIN] {
        assert_eq!(board.last_level(pin), Some(Level::Inactive));
    }
}

#[test]
fn multi_led_clamps_out_of_range() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "multi-led", "r": 250, "g": -5, "b": 100}));
    assert_eq!(board.last_analog(LED_R_PIN), Some(0));
    assert_eq!(board.last_analog(LED_G_PIN), Some(255));
    assert!(board.calls.contains(&BoardCall::PinMode { pin: LED_B_PIN, mode: PinMode::Pwm }));
}

#[test]
fn malformed_multi_led_touches_nothing() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "multi-led", "r": "bright", "g": 0, "b": 0}));
    assert!(board.calls.is_empty());
}

#[test]
fn gate_is_not_an_addressable_port() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "digital-write", "port": "LED_FET", "value": 1}));
    assert!(board.calls.is_empty());
}

// ── DC motors ─────────────────────────────────────────────────

#[test]
fn motor_mode_table() {
    let (mut c, mut board) = setup();
    // Motors start coasting, so power alone does not move them.
    send(&mut c, &mut board, json!({"name": "motor-power", "port": "M0", "power": 40}));
    assert_eq!(board.last_analog(10), Some(0));

    send(&mut c, &mut board, json!({"name": "motor-mode", "port": "M0", "mode": "normal"}));
    assert_eq!(board.last_analog(10), Some(409));
    assert_eq!(board.last_level(12), Some(Level::Inactive));

    send(&mut c, &mut board, json!({"name": "motor-direction", "port": "M0", "direction": "backward"}));
    assert_eq!(board.last_analog(10), Some(1023 - 409));
    assert_eq!(board.last_level(12), Some(Level::Active));

    send(&mut c, &mut board, json!({"name": "motor-mode", "port": "M0", "mode": "brake"}));
    assert_eq!(board.last_analog(10), Some(1023));
    assert_eq!(board.last_level(12), Some(Level::Active));

    send(&mut c, &mut board, json!({"name": "motor-mode", "port": "M0", "mode": "coast"}));
    assert_eq!(board.last_analog(10), Some(0));
    assert_eq!(board.last_level(12), Some(Level::Inactive));

    assert_eq!(
        c.motors().state("M0"),
        Some(MotorState { power: 409, mode: MotorMode::Coast })
    );
}

#[test]
fn init_board_resets_motors() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "motor-power", "port": "M1", "power": 100}));
    send(&mut c, &mut board, json!({"name": "motor-mode", "port": "M1", "mode": "normal"}));
    send(&mut c, &mut board, json!({"name": "init-board"}));
    assert_eq!(
        c.motors().state("M1"),
        Some(MotorState { power: 0, mode: MotorMode::Coast })
    );
    // Default actuator init drives both motor pins inactive as plain outputs.
    assert_eq!(board.last_level(11), Some(Level::Inactive));
    assert_eq!(board.last_level(13), Some(Level::Inactive));
    assert_eq!(board.last_level(LED_FET_PIN), Some(Level::Inactive));
}

// ── Servo synchronized motion ─────────────────────────────────

fn with_servos(c: &mut Controller, board: &mut MockBoard) {
    send(
        c,
        board,
        json!({"name": "configure-ports", "port-settings": {"V0": "servo", "V1": "servo"}}),
    );
    board.clear();
}

#[test]
fn begin_then_set_degree_records_only() {
    let (mut c, mut board) = setup();
    with_servos(&mut c, &mut board);
    send(&mut c, &mut board, json!({"name": "servo-sync"}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V0", "degree": 10}));
    assert!(c.servos().is_synchronized());
    assert_eq!(c.servos().target("V0"), Some(10.0));
    assert!(board.calls.is_empty());
}

#[test]
fn execute_with_nothing_recorded_completes_immediately() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "servo-sync"}));
    assert_eq!(
        send(&mut c, &mut board, json!({"name": "servo-sync", "phase": {"speed": 5}})),
        Dispatch::Done(None)
    );
    assert!(board.calls.is_empty());
}

#[test]
fn execute_with_zero_delta_completes_immediately() {
    let (mut c, mut board) = setup();
    with_servos(&mut c, &mut board);
    send(&mut c, &mut board, json!({"name": "servo-sync"}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V0", "degree": 90}));
    assert_eq!(
        send(&mut c, &mut board, json!({"name": "servo-sync", "phase": {"speed": 5}})),
        Dispatch::Done(None)
    );
    assert!(board.calls.is_empty());
}

#[test]
fn max_speed_writes_once_and_settles() {
    let (mut c, mut board) = setup();
    with_servos(&mut c, &mut board);
    send(&mut c, &mut board, json!({"name": "servo-sync"}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V0", "degree": 100}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V1", "degree": 110}));
    let id = pending(send(&mut c, &mut board, json!({"name": "servo-sync", "phase": {"speed": 20}})));

    assert_eq!(board.servo_writes(2), vec![100]);
    assert_eq!(board.servo_writes(3), vec![110]);

    c.poll(59, &mut board);
    assert!(drain(&mut c).completions().is_empty());
    c.poll(60, &mut board);
    assert_eq!(drain(&mut c).completions(), vec![Completion { id, result: Ok(None) }]);
    assert_eq!(board.calls.len(), 2);
}

#[test]
fn slowest_speed_interpolates_to_arrive_together() {
    let (mut c, mut board) = setup();
    with_servos(&mut c, &mut board);
    send(&mut c, &mut board, json!({"name": "servo-sync"}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V0", "degree": 100}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V1", "degree": 110}));
    let id = pending(send(&mut c, &mut board, json!({"name": "servo-sync", "phase": {"speed": 0}})));

    // 20 steps, 20 ms apart, then one more 20 ms wait.
    for t in 1..400 {
        c.poll(t, &mut board);
    }
    assert!(drain(&mut c).completions().is_empty());
    c.poll(400, &mut board);
    assert_eq!(drain(&mut c).completions(), vec![Completion { id, result: Ok(None) }]);

    let v0 = board.servo_writes(2);
    let v1 = board.servo_writes(3);
    assert_eq!(v0.len(), 20);
    assert_eq!(v1.len(), 20);
    assert_eq!(v0.last(), Some(&100));
    assert_eq!(v1.last(), Some(&110));
    assert!(v1.windows(2).all(|w| w[1] == w[0] + 1));
}

#[test]
fn late_poll_delays_motion_instead_of_jumping() {
    let (mut c, mut board) = setup();
    with_servos(&mut c, &mut board);
    send(&mut c, &mut board, json!({"name": "servo-sync"}));
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V0", "degree": 120}));
    let id = pending(send(&mut c, &mut board, json!({"name": "servo-sync", "phase": {"speed": 0}})));
    assert_eq!(board.servo_writes(2), vec![91]);

    c.poll(200, &mut board);
    assert_eq!(board.servo_writes(2), vec![91, 92]);

    // Back on schedule from here: one step every 20 ms.
    for t in 201..=240 {
        c.poll(t, &mut board);
    }
    assert_eq!(board.servo_writes(2), vec![91, 92, 93, 94]);

    let mut t = 240;
    let done = loop {
        t += 1;
        assert!(t < 2_000, "motion never completed");
        c.poll(t, &mut board);
        let done = drain(&mut c).completions();
        if !done.is_empty() {
            break done;
        }
    };
    assert_eq!(done, vec![Completion { id, result: Ok(None) }]);
    // 26 more steps after the one at 240, then one more wait.
    assert_eq!(t, 240 + 27 * 20);
    assert_eq!(board.servo_writes(2).len(), 30);
    assert_eq!(board.servo_writes(2).last(), Some(&120));
}

#[test]
fn motion_counts_from_request_time() {
    let (mut c, mut board) = setup();
    with_servos(&mut c, &mut board);
    c.poll(0, &mut board);
    c.submit_json(&json!({"name": "servo-sync"}), 50_000, &mut board).unwrap();
    c.submit_json(&json!({"name": "servo-degree", "port": "V1", "degree": 100}), 50_000, &mut board)
        .unwrap();
    let id = pending(
        c.submit_json(&json!({"name": "servo-sync", "phase": {"speed": 20}}), 50_000, &mut board)
            .unwrap(),
    );

    // Max speed settles for delta 10 × 3 ms from the request, not from t=0.
    c.poll(50_029, &mut board);
    assert!(drain(&mut c).completions().is_empty());
    c.poll(50_030, &mut board);
    assert_eq!(drain(&mut c).completions(), vec![Completion { id, result: Ok(None) }]);
}

#[test]
fn direct_degree_outside_sync() {
    let (mut c, mut board) = setup();
    send(&mut c, &mut board, json!({"name": "servo-degree", "port": "V4", "degree": 270}));
    assert_eq!(board.calls, vec![BoardCall::Servo { pin: 6, degree: 180 }]);
    assert_eq!(c.servos().last_written("V4"), Some(180.0));
}

// ── Sensor reads ──────────────────────────────────────────────

#[test]
fn read_completes_exactly_once() {
    let (mut c, mut board) = setup();
    let id = pending(send(&mut c, &mut board, json!({"name": "read-touch", "port": "K1"})));
    assert_eq!(
        board.calls,
        vec![BoardCall::Reporting { category: ReportCategory::Digital, pin: 15, enabled: true }]
    );

    let ev = BoardEvent::Report { category: ReportCategory::Digital, pin: 15, value: 1 };
    c.on_board_event(ev.clone(), &mut board);
    c.on_board_event(ev, &mut board);

    assert_eq!(drain(&mut c).completions(), vec![Completion { id, result: Ok(Some(1.0)) }]);
    assert_eq!(
        board.count(&BoardCall::Reporting { category: ReportCategory::Digital, pin: 15, enabled: false }),
        1
    );
}

#[test]
fn analog_reads_are_scaled() {
    let (mut c, mut board) = setup();
    let mut got = Vec::new();
    for raw in [0u16, 1023, 512] {
        let id = pending(send(&mut c, &mut board, json!({"name": "analog-read", "port": "K3"})));
        c.on_board_event(BoardEvent::Report { category: ReportCategory::Analog, pin: 17, value: raw }, &mut board);
        let done = drain(&mut c).completions();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id);
        got.push(done[0].result.clone().unwrap().unwrap());
    }
    assert_eq!(got[0], 0.0);
    assert_eq!(got[1], 100.0);
    assert!((got[2] - 50.0).abs() < 0.1);
}

#[test]
fn newer_read_supersedes_older() {
    let (mut c, mut board) = setup();
    let a = pending(send(&mut c, &mut board, json!({"name": "read-sound", "port": "K0"})));
    let b = pending(send(&mut c, &mut board, json!({"name": "read-light", "port": "K0"})));
    c.on_board_event(BoardEvent::Report { category: ReportCategory::Analog, pin: 14, value: 1023 }, &mut board);
    assert_eq!(
        drain(&mut c).completions(),
        vec![
            Completion { id: a, result: Err(ActionError::Superseded) },
            Completion { id: b, result: Ok(Some(100.0)) },
        ]
    );
}

#[test]
fn accelerometer_read_uses_frame_and_reply() {
    let (mut c, mut board) = setup();
    let id = pending(send(
        &mut c,
        &mut board,
        json!({"name": "accelerometer-read", "port": "ACC0", "axis": "z"}),
    ));
    assert_eq!(board.calls, vec![BoardCall::Frame(vec![0xF0, 0x0C, 0x01, 0x03, 0xF7])]);

    c.on_board_event(BoardEvent::CommandReply { command: frames::CMD_ACCELEROMETER, value: 512 }, &mut board);
    c.on_board_event(BoardEvent::CommandReply { command: frames::CMD_ACCELEROMETER, value: 1 }, &mut board);
    assert_eq!(drain(&mut c).completions(), vec![Completion { id, result: Ok(Some(512.0)) }]);
}

#[test]
fn unknown_action_leaves_dispatcher_usable() {
    let (mut c, mut board) = setup();
    let err = c.submit_json(&json!({"name": "moonwalk"}), 0, &mut board).unwrap_err();
    assert_eq!(err, ActionError::UnknownAction("moonwalk".into()));
    assert!(err.to_string().contains("moonwalk"));
    assert_eq!(
        send(&mut c, &mut board, json!({"name": "led", "port": "V2", "on": 1})),
        Dispatch::Done(None)
    );
    assert_eq!(board.calls, vec![BoardCall::Digital { pin: 4, level: Level::Active }]);
}

// ── Completion queue admission ────────────────────────────────

#[test]
fn undrained_reads_never_lose_a_completion() {
    let (mut c, mut board) = setup();
    let mut accepted = Vec::new();
    let mut refused = 0;
    for _ in 0..70 {
        match c.submit_json(&json!({"name": "digital-read", "port": "K0"}), 0, &mut board) {
            Ok(Dispatch::Pending(id)) => accepted.push(id),
            Err(ActionError::QueueFull) => refused += 1,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(accepted.len() + refused, 70);
    assert!(refused > 0);

    c.on_board_event(BoardEvent::Report { category: ReportCategory::Digital, pin: 14, value: 1 }, &mut board);

    let done = drain(&mut c).completions();
    assert_eq!(done.len(), accepted.len());
    assert_eq!(done.iter().map(|d| d.id).collect::<Vec<_>>(), accepted);
    assert_eq!(done.last().map(|d| d.result.clone()), Some(Ok(Some(1.0))));
    assert!(done[..done.len() - 1].iter().all(|d| d.result == Err(ActionError::Superseded)));

    // Draining frees the queue for new pending requests.
    pending(send(&mut c, &mut board, json!({"name": "digital-read", "port": "K0"})));
}
