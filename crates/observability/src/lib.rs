//! Tracing/logging setup shared by the rentgate binaries.

pub mod logging;

pub use logging::{LogFormat, init, init_with};
