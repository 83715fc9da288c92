//! Local terminal handling for interactive sessions

mod raw;
mod relay;
mod signals;
mod stdin;

pub use raw::{ensure_terminal, RawModeGuard};
pub use relay::{relay, RelayEnd, RelaySummary, RELAY_CHUNK_SIZE};
pub use signals::termination_signal;
pub use stdin::spawn_stdin_reader;
