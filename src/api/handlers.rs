//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use chrono::Utc;
use futures::stream::Stream;
use tokio_stream::{wrappers::WatchStream, StreamExt as _};
use tracing::{info, warn};

use super::responses::{
    ApiError, CreateTimerRequest, DurationRequest, HealthResponse, RenameRequest, StatusResponse,
    TimerView,
};
use crate::{
    error::Result as TimerResult,
    state::{total_seconds, AppState, Timer},
};

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Turn the outcome of an action on `id` into a response, mapping the
/// unknown-id no-op to 404.
fn respond(id: &str, outcome: TimerResult<Option<Timer>>) -> ApiResult<Json<TimerView>> {
    match outcome? {
        Some(timer) => Ok(Json(timer.into())),
        None => Err(ApiError::not_found(id)),
    }
}

/// Handle GET /timers - List every timer in display order
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<TimerView>> {
    Json(state.list().into_iter().map(TimerView::from).collect())
}

/// Handle POST /timers - Create an idle timer
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTimerRequest>,
) -> ApiResult<(StatusCode, Json<TimerView>)> {
    let seconds = total_seconds(req.minutes, req.seconds)?;
    let timer = state.create(&req.name, seconds).map_err(|e| {
        warn!("Rejected timer creation: {}", e);
        e
    })?;
    Ok((StatusCode::CREATED, Json(timer.into())))
}

/// Handle GET /timers/:id
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerView>> {
    respond(&id, Ok(state.get(&id)))
}

/// Handle POST /timers/:id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerView>> {
    info!(timer_id = %id, "Start requested");
    respond(&id, state.start(&id))
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerView>> {
    info!(timer_id = %id, "Pause requested");
    respond(&id, state.pause(&id))
}

/// Handle POST /timers/:id/resume
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerView>> {
    info!(timer_id = %id, "Resume requested");
    respond(&id, state.resume(&id))
}

/// Handle POST /timers/:id/cancel
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerView>> {
    info!(timer_id = %id, "Cancel requested");
    respond(&id, state.cancel(&id))
}

/// Handle POST /timers/:id/reset
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TimerView>> {
    info!(timer_id = %id, "Reset requested");
    respond(&id, state.reset(&id))
}

/// Handle PATCH /timers/:id/name
pub async fn rename_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<TimerView>> {
    respond(&id, state.rename(&id, &req.name))
}

/// Handle PATCH /timers/:id/duration
pub async fn duration_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<DurationRequest>,
) -> ApiResult<Json<TimerView>> {
    let seconds = total_seconds(req.minutes, req.seconds)?;
    respond(&id, state.set_duration(&id, seconds))
}

/// Handle DELETE /timers/:id
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    match state.delete(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::not_found(&id)),
    }
}

/// Handle GET /events - SSE stream of the full timer list after every change
pub async fn events_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stream = timer_events(WatchStream::new(state.subscribe()));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn timer_events<S>(lists: S) -> impl Stream<Item = std::result::Result<Event, Infallible>>
where
    S: Stream<Item = Vec<Timer>>,
{
    lists.filter_map(|timers| {
        let views: Vec<TimerView> = timers.into_iter().map(TimerView::from).collect();
        match Event::default().event("timers").json_data(views) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Failed to encode timer event: {}", e);
                None
            }
        }
    })
}

/// Handle GET /status - Session status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        timers: state.list().len(),
        active_tickers: state.active_tickers(),
        uptime: state.get_uptime(),
        timestamp: Utc::now(),
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
