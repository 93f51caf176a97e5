//! Integration tests for the session lifecycle through the controller:
//! open/close misuse, first-outcome-wins, board init on open, liveness
//! escalation, and close-time cancellation.

use serde_json::json;

use botlink::app::events::{Completion, SessionEvent};
use botlink::app::ports::{Level, ReportCategory};
use botlink::app::service::{Controller, Dispatch};
use botlink::config::ControllerConfig;
use botlink::error::{ActionError, SessionError};
use botlink::events::BoardEvent;
use botlink::pins::LED_FET_PIN;
use botlink::session::SessionState;

use crate::mock_board::{BoardCall, MockBoard, drain};

fn setup() -> (Controller, MockBoard) {
    (Controller::new(ControllerConfig::default()), MockBoard::new())
}

fn open(c: &mut Controller, board: &mut MockBoard) {
    c.open("ttyUSB0", 0, board).unwrap();
    c.on_board_event(BoardEvent::LinkUp, board);
    assert_eq!(c.session_state(), SessionState::Open);
}

#[test]
fn open_requires_transport() {
    let (mut c, mut board) = setup();
    assert_eq!(c.open("", 0, &mut board), Err(SessionError::MissingTransport));
    assert_eq!(c.session_state(), SessionState::Closed);
    assert!(board.calls.is_empty());
}

#[test]
fn second_open_fails_without_disturbing_first() {
    let (mut c, mut board) = setup();
    c.open("ttyUSB0", 0, &mut board).unwrap();
    assert_eq!(c.open("ttyUSB1", 0, &mut board), Err(SessionError::AlreadyOpen));
    assert_eq!(c.transport(), Some("ttyUSB0"));
    assert_eq!(board.calls, vec![BoardCall::OpenLink("ttyUSB0".into())]);

    c.on_board_event(BoardEvent::LinkUp, &mut board);
    assert_eq!(c.open("ttyUSB1", 0, &mut board), Err(SessionError::AlreadyOpen));
    assert_eq!(c.session_state(), SessionState::Open);
}

#[test]
fn close_when_never_opened_is_a_no_op() {
    let (mut c, mut board) = setup();
    c.close(&mut board);
    assert!(board.calls.is_empty());
    assert!(drain(&mut c).events.is_empty());
}

#[test]
fn link_up_initializes_board_and_reports_once() {
    let (mut c, mut board) = setup();
    open(&mut c, &mut board);
    assert_eq!(board.last_level(LED_FET_PIN), Some(Level::Inactive));

    // A late duplicate signal is ignored.
    c.on_board_event(BoardEvent::LinkFailed("late".into()), &mut board);
    c.on_board_event(BoardEvent::LinkUp, &mut board);

    assert_eq!(
        drain(&mut c).session_events(),
        vec![SessionEvent::Opened { transport: "ttyUSB0".into() }]
    );
    assert_eq!(c.session_state(), SessionState::Open);
}

#[test]
fn link_failure_reports_once_and_closes() {
    let (mut c, mut board) = setup();
    c.open("ttyUSB0", 0, &mut board).unwrap();
    c.on_board_event(BoardEvent::LinkFailed("busy".into()), &mut board);
    c.poll(10_000, &mut board);
    c.on_board_event(BoardEvent::LinkUp, &mut board);

    assert_eq!(
        drain(&mut c).session_events(),
        vec![SessionEvent::OpenFailed(SessionError::ConnectFailed("busy".into()))]
    );
    assert_eq!(c.session_state(), SessionState::Closed);
    assert_eq!(c.transport(), None);
}

#[test]
fn open_times_out() {
    let (mut c, mut board) = setup();
    c.open("ttyUSB0", 0, &mut board).unwrap();
    c.poll(4_999, &mut board);
    assert_eq!(c.session_state(), SessionState::Opening);
    c.poll(5_000, &mut board);

    assert_eq!(
        drain(&mut c).session_events(),
        vec![SessionEvent::OpenFailed(SessionError::Timeout)]
    );
    assert_eq!(c.session_state(), SessionState::Closed);
    // A reopen is allowed after the failure.
    assert!(c.open("ttyUSB0", 0, &mut board).is_ok());
}

#[test]
fn open_after_idle_gap_gets_full_timeout() {
    let (mut c, mut board) = setup();
    c.poll(0, &mut board);
    assert_eq!(c.next_deadline(), None);

    c.open("tty0", 50_000, &mut board).unwrap();
    assert_eq!(c.next_deadline(), Some(55_000));
    c.poll(50_005, &mut board);
    assert_eq!(c.session_state(), SessionState::Opening);
    assert!(drain(&mut c).session_events().is_empty());

    c.on_board_event(BoardEvent::LinkUp, &mut board);
    assert_eq!(c.session_state(), SessionState::Open);
    assert_eq!(
        drain(&mut c).session_events(),
        vec![SessionEvent::Opened { transport: "tty0".into() }]
    );
    // The first probe counts from the link coming up, not from t=0.
    assert_eq!(c.next_deadline(), Some(51_005));
}

#[test]
fn idle_open_still_times_out() {
    let (mut c, mut board) = setup();
    c.poll(0, &mut board);
    c.open("tty0", 50_000, &mut board).unwrap();
    c.poll(54_999, &mut board);
    assert_eq!(c.session_state(), SessionState::Opening);
    c.poll(55_000, &mut board);
    assert_eq!(
        drain(&mut c).session_events(),
        vec![SessionEvent::OpenFailed(SessionError::Timeout)]
    );
}

#[test]
fn answered_probes_keep_session_open() {
    let (mut c, mut board) = setup();
    open(&mut c, &mut board);
    for t in 1..=10u64 {
        c.poll(t * 1_000, &mut board);
        c.on_board_event(BoardEvent::VersionReply, &mut board);
    }
    assert_eq!(c.session_state(), SessionState::Open);
    assert_eq!(board.count(&BoardCall::QueryVersion), 10);
}

#[test]
fn unanswered_probes_drop_session_and_cancel_reads() {
    let (mut c, mut board) = setup();
    open(&mut c, &mut board);
    let Ok(Dispatch::Pending(id)) = c.submit_json(&json!({"name": "digital-read", "port": "K2"}), 0, &mut board) else {
        panic!("expected a pending read");
    };
    drain(&mut c);

    for t in 1..=3u64 {
        c.poll(t * 1_000, &mut board);
        assert_eq!(c.session_state(), SessionState::Open);
    }
    c.poll(4_000, &mut board);

    let sink = drain(&mut c);
    assert_eq!(sink.session_events(), vec![SessionEvent::LivenessLost]);
    assert_eq!(sink.completions(), vec![Completion { id, result: Err(ActionError::Cancelled) }]);
    assert_eq!(c.session_state(), SessionState::Closed);
    assert!(board.calls.contains(&BoardCall::Reporting {
        category: ReportCategory::Digital,
        pin: 16,
        enabled: false
    }));
    assert!(board.calls.contains(&BoardCall::CloseLink));
}

#[test]
fn close_cancels_probe_and_pending_motion() {
    let (mut c, mut board) = setup();
    open(&mut c, &mut board);
    c.submit_json(&json!({"name": "servo-sync"}), 0, &mut board).unwrap();
    c.submit_json(&json!({"name": "servo-degree", "port": "V5", "degree": 40}), 0, &mut board)
        .unwrap();
    let Ok(Dispatch::Pending(id)) =
        c.submit_json(&json!({"name": "servo-sync", "phase": {"speed": 0}}), 0, &mut board)
    else {
        panic!("expected a pending motion");
    };
    drain(&mut c);

    c.close(&mut board);
    let sink = drain(&mut c);
    assert_eq!(sink.completions(), vec![Completion { id, result: Err(ActionError::Cancelled) }]);
    assert_eq!(sink.session_events(), vec![SessionEvent::Closed]);
    assert_eq!(c.next_deadline(), None);

    board.clear();
    c.poll(60_000, &mut board);
    assert!(board.calls.is_empty());
}
