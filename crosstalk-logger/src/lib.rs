//! Shared tracing-subscriber setup for crosstalk binaries.

pub mod logging;

pub use logging::{LogConfig, LogFormat, LogOutput};
