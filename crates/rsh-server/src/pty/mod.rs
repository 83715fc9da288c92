//! Pseudo-terminal allocation for interactive sessions

mod process;
mod shell;

pub use process::{PtyProcess, SHELL_TERM};
pub use shell::{resolve_shell, validate_shell_path};
