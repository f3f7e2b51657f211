use axum::{body::Bytes, http::HeaderMap};
use serde::de::DeserializeOwned;
use shared::{DEFAULT_LEADERBOARD_LIMIT, Handle, MAX_LEADERBOARD_LIMIT};

use crate::error::AppError;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const UNKNOWN_ORIGIN: &str = "0.0.0.0";

/// Bodies are decoded by hand so that bad JSON is a 400 like any other bad input.
pub fn parse_body<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(bytes).map_err(|_| AppError::MalformedPayload)
}

/// First hop of `X-Forwarded-For`, as set by the reverse proxy.
pub fn client_origin(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .unwrap_or(UNKNOWN_ORIGIN)
        .to_string()
}

pub fn throttle_key(origin: &str, handle: &Handle) -> String {
    format!("{origin}:{handle}")
}

/// Missing or non-numeric limits get the default, the rest is clamped to 1..=500.
pub fn leaderboard_limit(raw: Option<&str>) -> usize {
    match raw.map(str::trim).and_then(|raw| raw.parse::<i64>().ok()) {
        Some(limit) => limit.clamp(1, MAX_LEADERBOARD_LIMIT as i64) as usize,
        None => DEFAULT_LEADERBOARD_LIMIT,
    }
}
