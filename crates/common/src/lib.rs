//! Common utilities for howler-rs
//!
//! Ambient pieces shared by the binaries: tracing setup and the error type
//! for failures outside the USB layer.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{LOG_LEVELS, setup_logging};
