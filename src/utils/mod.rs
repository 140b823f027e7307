//! Process-level helpers shared by the binary and the integration tests

pub mod signals;

pub use signals::shutdown_signal;
