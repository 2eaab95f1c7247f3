//! Logging utilities.
//!
//! This module centralizes logger initialization and the diagnostics the
//! object layer emits: readable names for native error codes and framebuffer
//! statuses, and draining of the native error queue.
//!
//! Everything goes through the `log` facade; `init_logging` is a convenience
//! for binaries and tests that want `env_logger` output.

mod diagnostics;
mod init;

pub use diagnostics::{error_name, framebuffer_status_name};
pub use init::{init_logging, LoggingConfig};

pub(crate) use diagnostics::drain_errors;
