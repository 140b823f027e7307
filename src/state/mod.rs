//! State management module
//!
//! This module contains the timer record, the local store, the state
//! machine that ties them to the tickers, and the per-session runtime state.

pub mod app_state;
pub mod board;
pub mod store;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use board::{Effect, TickOutcome, TimerBoard};
pub use store::LocalStore;
pub use timer::{format_clock, total_seconds, Timer, TimerPatch, TimerStatus};
