//! JSON bodies exchanged between the pop server and its clients.
//!
//! Request fields are optional so that a missing field is reported as an
//! invalid handle or count rather than a decoding failure.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct HandleRequest {
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HandleResponse {
    pub handle: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalResponse {
    pub total: u64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct BatchRequest {
    #[serde(default)]
    pub handle: Option<String>,

    #[serde(default)]
    pub count: Option<Value>,

    /// Same id on a retry means "this claim may already have been applied".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PopResponse {
    pub handle: String,
    pub total: u64,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub handle: String,
    pub total: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ResetRequest {
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}
