use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::Value;
use shared::{
    Handle, PopCount,
    payloads::{
        BatchRequest, HandleRequest, HandleResponse, LeaderboardResponse, PopResponse,
        ResetRequest, ResetResponse, TotalResponse,
    },
};
use tracing::{info, warn};

use crate::{
    error::AppError,
    state::AppState,
    utils::{client_origin, leaderboard_limit, parse_body, throttle_key},
};

#[derive(Deserialize)]
pub struct MeQuery {
    handle: Option<String>,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    limit: Option<String>,
}

fn required_handle(raw: Option<&str>) -> Result<Handle, AppError> {
    Ok(Handle::parse(raw.unwrap_or_default())?)
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<HandleResponse>, AppError> {
    let request: HandleRequest = parse_body(&body)?;
    let handle = required_handle(request.handle.as_deref())?;

    let store = state.counter.store();
    store.ensure_profile(&handle).await?;
    store.ensure_counter(&handle).await?;

    info!("Registered {handle}");

    Ok(Json(HandleResponse {
        handle: handle.into_inner(),
    }))
}

pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MeQuery>,
) -> Result<Json<TotalResponse>, AppError> {
    let handle = required_handle(query.handle.as_deref())?;
    let total = state.counter.store().get_total(&handle).await?;

    Ok(Json(TotalResponse { total }))
}

pub async fn pop_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PopResponse>, AppError> {
    let request: HandleRequest = parse_body(&body)?;
    let handle = required_handle(request.handle.as_deref())?;

    let key = throttle_key(&client_origin(&headers), &handle);
    if !state.limiter.allow(&key) {
        warn!("Throttled {key}");
        return Err(AppError::RateLimited);
    }

    state.counter.store().ensure_profile(&handle).await?;
    let increment = state.counter.increment_by(&handle, PopCount::ONE, None).await?;

    Ok(Json(PopResponse {
        handle: handle.into_inner(),
        total: increment.total,
        duplicate: false,
    }))
}

pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PopResponse>, AppError> {
    let request: BatchRequest = parse_body(&body)?;
    let handle = required_handle(request.handle.as_deref())?;
    let count = PopCount::try_from(request.count.as_ref().unwrap_or(&Value::Null))?;

    state.counter.store().ensure_profile(&handle).await?;
    let increment = state
        .counter
        .increment_by(&handle, count, request.claim_id)
        .await?;

    if increment.applied {
        info!("Claimed {count} pops for {handle}, total {}", increment.total);
    } else {
        warn!("Ignored repeated claim for {handle}, total {}", increment.total);
    }

    Ok(Json(PopResponse {
        handle: handle.into_inner(),
        total: increment.total,
        duplicate: !increment.applied,
    }))
}

pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let limit = leaderboard_limit(query.limit.as_deref());
    let leaderboard = state.counter.store().leaderboard(limit).await?;

    Ok(Json(LeaderboardResponse { leaderboard }))
}

pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResetResponse>, AppError> {
    let request: ResetRequest = parse_body(&body).unwrap_or_default();

    let authorized = match (state.config.admin_secret.as_deref(), request.secret.as_deref()) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };

    if !authorized {
        warn!("Rejected leaderboard reset");
        return Err(AppError::Unauthorized);
    }

    state.counter.store().reset().await?;
    warn!("Leaderboard wiped");

    Ok(Json(ResetResponse {
        success: true,
        message: "Leaderboard wiped successfully".to_string(),
    }))
}
