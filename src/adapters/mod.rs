//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements | Connects to                    |
//! |-------------|------------|--------------------------------|
//! | `sim_board` | BoardPort  | In-memory simulated board      |
//! | `log_sink`  | EventSink  | `log` output, JSON lines       |
//! | `time`      | -          | Host monotonic clock           |

pub mod log_sink;
pub mod sim_board;
pub mod time;
