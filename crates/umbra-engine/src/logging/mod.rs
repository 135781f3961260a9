//! Logging utilities.
//!
//! This module centralizes logger initialization. Library code only talks to
//! the standard `log` facade; binaries call [`init_logging`] once.

mod init;

pub use init::{init_logging, LoggingConfig};
