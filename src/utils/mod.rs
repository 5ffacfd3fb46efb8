//! Utilities: error types and logging

pub mod error;
pub mod logging;

pub use error::{GreenThumbError, Result};
pub use logging::{init_logging, LogConfig, LogLevel, TrainingLogger};
