//! Initiator commands

pub mod run;
pub mod shell;
