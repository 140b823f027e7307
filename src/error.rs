//! Error types for timer operations

use thiserror::Error;

use crate::state::TimerStatus;

/// Errors raised by user-initiated timer operations.
///
/// Every variant is produced before any state mutation, so a failed
/// operation leaves the local store and the backend untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The timer name was empty after trimming.
    #[error("timer name must not be empty")]
    EmptyName,

    /// The requested duration was zero.
    #[error("timer duration must be positive")]
    NonPositiveDuration,

    /// Minutes and seconds do not fit the supported range.
    #[error("timer duration is too large: {minutes}m {seconds}s")]
    DurationOverflow { minutes: u32, seconds: u32 },

    /// The action is not a legal transition from the timer's current status.
    #[error("cannot {action} timer {id} while it is {from}")]
    InvalidTransition {
        id: String,
        from: TimerStatus,
        action: &'static str,
    },

    /// The timer must be stopped before it can be edited.
    #[error("timer {id} is running; stop it before editing")]
    TimerRunning { id: String },
}

pub type Result<T> = std::result::Result<T, TimerError>;
