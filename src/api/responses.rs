//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::TimerError, state::Timer};

/// Body of `POST /timers`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimerRequest {
    pub name: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

/// Body of `PATCH /timers/:id/name`
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// Body of `PATCH /timers/:id/duration`
#[derive(Debug, Clone, Deserialize)]
pub struct DurationRequest {
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

/// A timer together with its formatted clock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    pub display: String,
}

impl From<Timer> for TimerView {
    fn from(timer: Timer) -> Self {
        let display = timer.display();
        Self { timer, display }
    }
}

/// Status response with session information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub active_tickers: usize,
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error returned by the timer endpoints, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Timer(TimerError),
    NotFound(String),
}

impl ApiError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound(format!("timer not found: {id}"))
    }
}

impl From<TimerError> for ApiError {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Timer(e) => {
                let status = match e {
                    TimerError::EmptyName
                    | TimerError::NonPositiveDuration
                    | TimerError::DurationOverflow { .. } => StatusCode::BAD_REQUEST,
                    TimerError::TimerRunning { .. } => StatusCode::CONFLICT,
                    TimerError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, e.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
