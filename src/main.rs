//! botlink runner: drives the controller against the simulated board.
//!
//! ```text
//!  stdin (JSON lines) ──▶ Controller::submit_json ──▶ SimBoard
//!                              ▲        │                │
//!                  poll(now) ──┘        ▼                │ board events
//!                             JsonLineSink ◀─────────────┘
//!                                  │
//!                                  ▼
//!                       stdout (JSON lines)
//! ```
//!
//! Each request line is answered with its immediate result, then the loop
//! keeps polling until every pending read and servo motion has completed.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use serde_json::{Value, json};

use botlink::adapters::log_sink::JsonLineSink;
use botlink::adapters::sim_board::SimBoard;
use botlink::adapters::time::HostClock;
use botlink::app::ports::EventSink;
use botlink::app::service::{Controller, Dispatch};
use botlink::config::ControllerConfig;
use botlink::session::SessionState;

/// Idle sleep between polls while work is pending.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Parser, Debug)]
#[command(version, about = "Drive the botlink controller from JSON lines on stdin")]
struct Args {
    /// controller configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// transport identifier to open the session on
    #[arg(short, long, default_value = "sim0")]
    transport: String,

    /// enable debug messages
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter(
        None,
        if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info },
    );
    builder.target(env_logger::Target::Stderr);
    builder.init();

    let config = load_config(args.config.as_ref())?;
    info!("botlink starting, config: {:?}", config);

    let clock = HostClock::new();
    let mut board = SimBoard::new();
    let mut controller = Controller::new(config);
    let mut sink = JsonLineSink::new(io::stdout());

    controller.poll(clock.uptime_ms(), &mut board);
    controller.open(&args.transport, clock.uptime_ms(), &mut board)?;
    pump(&mut controller, &mut board, &clock, &mut sink, |c| {
        c.session_state() == SessionState::Opening
    });
    if controller.session_state() != SessionState::Open {
        bail!("could not open session on {}", args.transport);
    }

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("skipping unparsable line: {}", e);
                continue;
            }
        };

        let now = clock.uptime_ms();
        controller.poll(now, &mut board);
        let reply = match controller.submit_json(&request, now, &mut board) {
            Ok(Dispatch::Done(value)) => json!({"ok": true, "value": value}),
            Ok(Dispatch::Pending(id)) => json!({"pending": id}),
            Err(e) => json!({"ok": false, "error": e.to_string()}),
        };
        println!("{reply}");

        pump(&mut controller, &mut board, &clock, &mut sink, Controller::has_pending);
        if controller.session_state() == SessionState::Closed {
            warn!("session dropped, stopping");
            break;
        }
    }

    controller.close(&mut board);
    controller.drain_events(&mut sink);
    io::stdout().flush().context("flushing stdout")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<ControllerConfig> {
    let config = match path {
        Some(p) => {
            let text = fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", p.display()))?
        }
        None => ControllerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Feed board events and timers into the controller until `busy` is false
/// and the board has nothing left to deliver.
fn pump(
    controller: &mut Controller,
    board: &mut SimBoard,
    clock: &HostClock,
    sink: &mut impl EventSink,
    busy: impl Fn(&Controller) -> bool,
) {
    loop {
        while let Some(event) = board.pop_event() {
            controller.on_board_event(event, board);
        }
        controller.poll(clock.uptime_ms(), board);
        controller.drain_events(sink);

        if !busy(controller) && !board.has_events() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
}
