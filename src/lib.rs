//! Countdown Sync - named countdown timers kept in sync across sessions
//!
//! Each session ticks its running timers locally, writes to the backend on a
//! reduced cadence, and folds the backend's change feed back into its local
//! store without double-counting its own writes.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::{Config, SyncSettings};
pub use error::TimerError;
pub use state::AppState;
pub use utils::signals::shutdown_signal;
