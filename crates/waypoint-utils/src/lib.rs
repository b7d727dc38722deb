//! # Waypoint Utilities
//!
//! Shared helpers for the waypoint workspace. Right now that is the `tracing`
//! subscriber setup used by the command line front end.

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, log_format_from_env, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
