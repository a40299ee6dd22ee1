//! Logging utilities.
//!
//! The renderer reports recoverable misuse (stack underflow, missing device
//! capabilities, unsupported combiner modes) through the `log` facade. This
//! module only owns the optional `env_logger` setup.

mod init;

pub use init::{init_logging, LoggingConfig};
