use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use fireplace_common::{ControllerStatus, Schedule, ThermostatMode, ValidationError};

use crate::{
    app::{monotonic_ms, now_in_timezone, AppState, Core},
    ir::IrDiagnostics,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing '{0}' parameter")]
    MissingParam(&'static str),

    #[error("Invalid {0} value")]
    Malformed(&'static str),

    #[error(transparent)]
    Rejected(#[from] ValidationError),

    #[error("Invalid timezone value")]
    UnknownTimezone,

    #[error("Failed to persist {0}")]
    Persist(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        error_response(status, &self.to_string())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    status: ControllerStatus,
    #[serde(rename = "scheduleEnabled")]
    schedule_enabled: bool,
    #[serde(rename = "nextScheduleEpoch")]
    next_schedule_epoch: Option<i64>,
    #[serde(rename = "timeSynced")]
    time_synced: bool,
    timezone: String,
}

#[derive(Debug, Serialize)]
struct TimeStatus {
    #[serde(rename = "timeSynced")]
    time_synced: bool,
    timezone: String,
    #[serde(rename = "nowEpoch")]
    now_epoch: i64,
}

#[derive(Debug, Deserialize)]
struct TimezoneUpdate {
    timezone: String,
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/target", post(handle_set_target))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/hysteresis", post(handle_set_hysteresis))
        .route("/api/offset", post(handle_set_offset))
        .route("/api/ir/on", post(handle_ir_on))
        .route("/api/ir/off", post(handle_ir_off))
        .route("/api/ir/heat/on", post(handle_ir_heat_on))
        .route("/api/ir/heat/off", post(handle_ir_heat_off))
        .route("/api/ir/heat/up", post(handle_ir_heat_up))
        .route("/api/ir/heat/down", post(handle_ir_heat_down))
        .route("/api/ir/light/toggle", post(handle_ir_light_toggle))
        .route("/api/ir/timer/toggle", post(handle_ir_timer_toggle))
        .route("/api/ir/diagnostics", get(handle_get_ir_diagnostics))
        .route("/api/hold/enter", post(handle_hold_enter))
        .route("/api/hold/exit", post(handle_hold_exit))
        .route("/api/safety/reset", post(handle_safety_reset))
        .route(
            "/api/schedule",
            get(handle_get_schedule).put(handle_put_schedule),
        )
        .route("/api/time", get(handle_get_time))
        .route("/api/timezone", put(handle_put_timezone))
        .with_state(app_state)
}

pub fn status_view(core: &Core, now_ms: u64) -> StatusView {
    let next_schedule_epoch =
        now_in_timezone(&core.timezone).and_then(|now| core.schedule.next_event_epoch(now));
    StatusView {
        status: core.engine.status(now_ms, core.sender.diagnostics().device),
        schedule_enabled: core.schedule.enabled,
        next_schedule_epoch,
        time_synced: core.time_synced,
        timezone: core.timezone.clone(),
    }
}

async fn handle_get_status(State(state): State<AppState>) -> Json<StatusView> {
    let core = state.core.lock().await;
    Json(status_view(&core, monotonic_ms()))
}

fn param<'a>(params: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str, ApiError> {
    params
        .get(name)
        .map(|value| value.trim())
        .ok_or(ApiError::MissingParam(name))
}

async fn handle_set_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusView> {
    let target = param(&params, "value")?
        .parse::<f32>()
        .map_err(|_| ApiError::Malformed("temperature"))?;

    let mut core = state.core.lock().await;
    let now_ms = monotonic_ms();
    core.engine.set_target_temp(target, now_ms)?;
    Ok(Json(status_view(&core, now_ms)))
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusView> {
    let mode: ThermostatMode = param(&params, "value")?.parse()?;

    let mut core = state.core.lock().await;
    let now_ms = monotonic_ms();
    core.engine.set_mode(mode, now_ms);
    Ok(Json(status_view(&core, now_ms)))
}

async fn handle_set_hysteresis(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusView> {
    let hysteresis = param(&params, "value")?
        .parse::<f32>()
        .map_err(|_| ApiError::Malformed("hysteresis"))?;

    let mut core = state.core.lock().await;
    let now_ms = monotonic_ms();
    core.engine.set_hysteresis(hysteresis, now_ms)?;
    Ok(Json(status_view(&core, now_ms)))
}

async fn handle_set_offset(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusView> {
    let offset = param(&params, "value")?
        .parse::<i32>()
        .map_err(|_| ApiError::Malformed("offset"))?;

    let mut core = state.core.lock().await;
    let now_ms = monotonic_ms();
    core.engine.set_fireplace_offset(offset, now_ms)?;
    Ok(Json(status_view(&core, now_ms)))
}

/// Runs one manual IR operation against the core and reports the new status.
async fn manual(state: AppState, op: fn(&mut Core, u64)) -> Json<StatusView> {
    let mut core = state.core.lock().await;
    let now_ms = monotonic_ms();
    op(&mut core, now_ms);
    Json(status_view(&core, now_ms))
}

async fn handle_ir_on(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_on(now, &mut core.sender)).await
}

async fn handle_ir_off(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_off(now, &mut core.sender)).await
}

async fn handle_ir_heat_on(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_heat_on(now, &mut core.sender)).await
}

async fn handle_ir_heat_off(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_heat_off(now, &mut core.sender)).await
}

async fn handle_ir_heat_up(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_heat_up(now, &mut core.sender)).await
}

async fn handle_ir_heat_down(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_heat_down(now, &mut core.sender)).await
}

async fn handle_ir_light_toggle(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_light_toggle(now, &mut core.sender)).await
}

async fn handle_ir_timer_toggle(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.manual_timer_toggle(now, &mut core.sender)).await
}

async fn handle_get_ir_diagnostics(State(state): State<AppState>) -> Json<IrDiagnostics> {
    Json(state.core.lock().await.sender.diagnostics())
}

async fn handle_hold_enter(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusView> {
    let minutes = match params.get("minutes") {
        Some(value) => Some(
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ApiError::Malformed("minutes"))?,
        ),
        None => None,
    };

    let mut core = state.core.lock().await;
    let now_ms = monotonic_ms();
    let max_minutes = u64::from(core.engine.config.max_hold_minutes);
    let duration_ms = minutes
        .filter(|minutes| *minutes > 0)
        .map(|minutes| minutes.min(max_minutes) * 60_000);
    core.engine.enter_hold(duration_ms, now_ms);
    Ok(Json(status_view(&core, now_ms)))
}

async fn handle_hold_exit(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, _| {
        core.engine.exit_hold();
    })
    .await
}

async fn handle_safety_reset(State(state): State<AppState>) -> Json<StatusView> {
    manual(state, |core, now| core.engine.reset_safety(now)).await
}

async fn handle_get_schedule(State(state): State<AppState>) -> Json<Schedule> {
    Json(state.core.lock().await.schedule.clone())
}

async fn handle_put_schedule(
    State(state): State<AppState>,
    Json(schedule): Json<Schedule>,
) -> ApiResult<Schedule> {
    let schedule = state.core.lock().await.replace_schedule(schedule).clone();
    if let Err(err) = state.data_dir.save_schedule(&schedule).await {
        warn!("failed to persist schedule update: {err:#}");
        return Err(ApiError::Persist("schedule"));
    }
    Ok(Json(schedule))
}

async fn handle_get_time(State(state): State<AppState>) -> Json<TimeStatus> {
    let core = state.core.lock().await;
    Json(TimeStatus {
        time_synced: core.time_synced,
        timezone: core.timezone.clone(),
        now_epoch: Utc::now().timestamp(),
    })
}

async fn handle_put_timezone(
    State(state): State<AppState>,
    Json(update): Json<TimezoneUpdate>,
) -> ApiResult<TimeStatus> {
    if update.timezone.parse::<Tz>().is_err() {
        return Err(ApiError::UnknownTimezone);
    }
    if let Err(err) = state.data_dir.save_timezone(&update.timezone).await {
        warn!("failed to persist timezone update: {err:#}");
        return Err(ApiError::Persist("runtime settings"));
    }

    let mut core = state.core.lock().await;
    core.timezone = update.timezone;
    Ok(Json(TimeStatus {
        time_synced: now_in_timezone(&core.timezone).is_some(),
        timezone: core.timezone.clone(),
        now_epoch: Utc::now().timestamp(),
    }))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
