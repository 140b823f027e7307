//! Timer record shared between the local store and the backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TimerError};

/// Lifecycle status of a countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Finished,
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TimerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(TimerStatus::Idle),
            "running" => Ok(TimerStatus::Running),
            "paused" => Ok(TimerStatus::Paused),
            "finished" => Ok(TimerStatus::Finished),
            other => Err(format!("unknown timer status: {other}")),
        }
    }
}

/// A single countdown timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// UUID v4 string, assigned at creation.
    pub id: String,
    /// Display name, never empty.
    pub name: String,
    /// Configured duration in seconds.
    pub initial_seconds: u32,
    /// Seconds left on the clock, always `<= initial_seconds`.
    pub remaining_seconds: u32,
    pub status: TimerStatus,
    pub created_at: DateTime<Utc>,
}

impl Timer {
    /// Create a new idle timer after validating its name and duration.
    pub fn new(name: &str, initial_seconds: u32) -> Result<Self> {
        let name = validate_name(name)?;
        let initial_seconds = validate_duration(initial_seconds)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            initial_seconds,
            remaining_seconds: initial_seconds,
            status: TimerStatus::Idle,
            created_at: Utc::now(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Remaining time formatted as `MM:SS`.
    pub fn display(&self) -> String {
        format_clock(self.remaining_seconds)
    }

    /// Clamp a record received from elsewhere back into the local invariants.
    pub fn sanitized(mut self) -> Self {
        if self.remaining_seconds > self.initial_seconds {
            self.remaining_seconds = self.initial_seconds;
        }
        if self.status == TimerStatus::Finished {
            self.remaining_seconds = 0;
        }
        self
    }
}

/// Partial column update, mirroring a backend `UPDATE ... SET` on one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TimerStatus>,
}

impl TimerPatch {
    /// Patch written on a periodic tick.
    pub fn remaining(remaining_seconds: u32) -> Self {
        Self {
            remaining_seconds: Some(remaining_seconds),
            ..Self::default()
        }
    }

    /// Patch written when the countdown reaches zero.
    pub fn finished() -> Self {
        Self {
            remaining_seconds: Some(0),
            status: Some(TimerStatus::Finished),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, timer: &mut Timer) {
        if let Some(name) = &self.name {
            timer.name = name.clone();
        }
        if let Some(initial) = self.initial_seconds {
            timer.initial_seconds = initial;
        }
        if let Some(remaining) = self.remaining_seconds {
            timer.remaining_seconds = remaining;
        }
        if let Some(status) = self.status {
            timer.status = status;
        }
    }
}

/// Trim a user-supplied name and reject it if nothing is left.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TimerError::EmptyName);
    }
    Ok(trimmed.to_string())
}

pub fn validate_duration(seconds: u32) -> Result<u32> {
    if seconds == 0 {
        return Err(TimerError::NonPositiveDuration);
    }
    Ok(seconds)
}

/// Combine the minutes and seconds fields of a form into a validated total.
pub fn total_seconds(minutes: u32, seconds: u32) -> Result<u32> {
    let total = minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .ok_or(TimerError::DurationOverflow { minutes, seconds })?;
    validate_duration(total)
}

/// Format a number of seconds as a zero-padded `MM:SS` clock.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
