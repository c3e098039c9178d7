//! Axum route handlers for the leaderboard RPC API.

use crate::commands;
use crate::error::StoreError;
use crate::period::PeriodKey;
use crate::registry;
use crate::reporter;
use crate::scheduler::{Phase, Scheduler};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use leaderboard_types::*;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub start_time: Instant,
    pub update_interval_secs: u64,
}

type RpcResult<T> = (StatusCode, Json<RpcResponse<T>>);

fn store_failure<T: serde::Serialize>(context: &str, e: StoreError) -> RpcResult<T> {
    log::error!("[LEADERBOARD] {}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(RpcResponse::err(format!("{}: {}", context, e))),
    )
}

// =====================================================
// User Endpoints
// =====================================================

// POST /rpc/users/add
pub async fn users_add(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddUserRequest>,
) -> RpcResult<AddOutcome> {
    let scheduler = state.scheduler.clone();
    match registry::add(scheduler.db(), scheduler.fetcher(), &req.username).await {
        Ok(outcome) => {
            let status = match outcome {
                AddOutcome::Created { .. } => StatusCode::OK,
                AddOutcome::AlreadyExists { .. } => StatusCode::CONFLICT,
                AddOutcome::InvalidIdentity { .. } => StatusCode::BAD_REQUEST,
            };
            (status, Json(RpcResponse::ok(outcome)))
        }
        Err(e) => store_failure("Failed to add user", e),
    }
}

// POST /rpc/users/remove
pub async fn users_remove(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoveUserRequest>,
) -> RpcResult<RemoveOutcome> {
    match registry::remove(state.scheduler.db(), &req.username) {
        Ok(outcome) => {
            let status = match outcome {
                RemoveOutcome::Removed { .. } => StatusCode::OK,
                RemoveOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
            };
            (status, Json(RpcResponse::ok(outcome)))
        }
        Err(e) => store_failure("Failed to remove user", e),
    }
}

// GET /rpc/users/list
pub async fn users_list(State(state): State<Arc<AppState>>) -> RpcResult<Vec<CurrentRecord>> {
    match registry::list(state.scheduler.db()) {
        Ok(records) => (StatusCode::OK, Json(RpcResponse::ok(records))),
        Err(e) => store_failure("Failed to list users", e),
    }
}

// =====================================================
// Leaderboard Endpoints
// =====================================================

// GET /rpc/leaderboard
pub async fn leaderboard(State(state): State<Arc<AppState>>) -> RpcResult<Vec<RankedEntry>> {
    match reporter::live_leaderboard(state.scheduler.db()) {
        Ok(entries) => (StatusCode::OK, Json(RpcResponse::ok(entries))),
        Err(e) => store_failure("Failed to read leaderboard", e),
    }
}

// POST /rpc/leaderboard/period
pub async fn leaderboard_period(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PeriodSummaryRequest>,
) -> RpcResult<PeriodSummary> {
    let period = match PeriodKey::parse(&req.period) {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(RpcResponse::err(e))),
    };
    match reporter::period_summary(state.scheduler.db(), &period) {
        Ok(entries) => (
            StatusCode::OK,
            Json(RpcResponse::ok(PeriodSummary {
                period: period.to_string(),
                entries: entries.unwrap_or_default(),
            })),
        ),
        Err(e) => store_failure("Failed to read period summary", e),
    }
}

// GET /rpc/periods
pub async fn periods(State(state): State<Arc<AppState>>) -> RpcResult<Vec<String>> {
    match state.scheduler.db().list_periods() {
        Ok(periods) => (StatusCode::OK, Json(RpcResponse::ok(periods))),
        Err(e) => store_failure("Failed to list periods", e),
    }
}

// POST /rpc/snapshots
pub async fn snapshots(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PeriodSummaryRequest>,
) -> RpcResult<Vec<PeriodSnapshot>> {
    let period = match PeriodKey::parse(&req.period) {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(RpcResponse::err(e))),
    };
    match state.scheduler.db().get_snapshot_rows(&period) {
        Ok(rows) => (StatusCode::OK, Json(RpcResponse::ok(rows))),
        Err(e) => store_failure("Failed to read snapshots", e),
    }
}

// =====================================================
// Cycle / Command Endpoints
// =====================================================

// POST /rpc/cycle/run
pub async fn cycle_run(State(state): State<Arc<AppState>>) -> RpcResult<CycleOutcome> {
    // Detached so a client disconnect cannot cut the cycle short
    let scheduler = state.scheduler.clone();
    match tokio::spawn(async move { scheduler.run_now().await }).await {
        Ok(outcome) => (StatusCode::OK, Json(RpcResponse::ok(outcome))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RpcResponse::err(format!("Update cycle aborted: {}", e))),
        ),
    }
}

// POST /rpc/command
pub async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> RpcResult<CommandReply> {
    let Some(cmd) = commands::parse(&req.text) else {
        return (
            StatusCode::OK,
            Json(RpcResponse::ok(CommandReply {
                reply: commands::help(),
            })),
        );
    };

    let scheduler = state.scheduler.clone();
    let result = tokio::spawn(async move { commands::execute(cmd, &scheduler).await }).await;
    match result {
        Ok(Ok(reply)) => (StatusCode::OK, Json(RpcResponse::ok(CommandReply { reply }))),
        Ok(Err(e)) => (StatusCode::BAD_REQUEST, Json(RpcResponse::err(e))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RpcResponse::err(format!("Command aborted: {}", e))),
        ),
    }
}

// GET /rpc/status
pub async fn status(State(state): State<Arc<AppState>>) -> RpcResult<ServiceStatus> {
    let scheduler = &state.scheduler;
    let tracked_users = match scheduler.db().list_identities() {
        Ok(users) => users.len(),
        Err(e) => return store_failure("Failed to read status", e),
    };
    let sched_state = scheduler.state();

    (
        StatusCode::OK,
        Json(RpcResponse::ok(ServiceStatus {
            running: true,
            uptime_secs: state.start_time.elapsed().as_secs(),
            tracked_users,
            cycle_running: sched_state.phase == Phase::Running,
            last_tick_at: scheduler.last_tick_at(),
            last_summary_period: sched_state.last_summary_period.map(|p| p.to_string()),
            update_interval_secs: state.update_interval_secs,
            degraded_policy: scheduler.settings().degraded_policy.to_string(),
            last_cycle: scheduler.last_report(),
        })),
    )
}
