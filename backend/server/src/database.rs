//! # Redis
//!
//! RAM database holding profiles, pop totals and claim ids.
//!
//! ## Requirements
//!
//! - Atomic increments, concurrent pops for one handle must not be lost
//! - Leaderboard reads ordered by total without a scan
//! - O(1) total lookups
//!
//! ## Implementation
//!
//! - `popdog:profiles`: set of handles
//! - `popdog:totals`: sorted set, handle scored by total pops. `ZREVRANGE` is the leaderboard
//! - `popdog:updated_at`: hash of handle to RFC 3339 timestamp
//! - `popdog:claims`: hash of handle to last applied claim id
//! - Increments run as one Lua script so the claim check, the `ZINCRBY` and the
//!   timestamp land together
//! - Scores are doubles, exact for totals below 2^53
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use shared::{Handle, PopCount, payloads::LeaderboardEntry};
use uuid::Uuid;

use crate::store::{CounterStore, Increment, StoreError};

pub const PROFILES_KEY: &str = "popdog:profiles";
pub const TOTALS_KEY: &str = "popdog:totals";
pub const UPDATED_AT_KEY: &str = "popdog:updated_at";
pub const CLAIMS_KEY: &str = "popdog:claims";

const ALL_KEYS: [&str; 4] = [TOTALS_KEY, UPDATED_AT_KEY, CLAIMS_KEY, PROFILES_KEY];

const INCREMENT_SCRIPT: &str = r#"
local handle = ARGV[1]
local claim = ARGV[3]

if claim ~= '' then
    if redis.call('HGET', KEYS[3], handle) == claim then
        local total = redis.call('ZSCORE', KEYS[1], handle)
        return {total or '0', 0}
    end
end

local total = redis.call('ZINCRBY', KEYS[1], ARGV[2], handle)
redis.call('HSET', KEYS[2], handle, ARGV[4])
if claim ~= '' then
    redis.call('HSET', KEYS[3], handle, claim)
end
return {total, 1}
"#;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    increment: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            increment: Script::new(INCREMENT_SCRIPT),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_total(handle: &str, score: &str) -> Result<u64, StoreError> {
    let score: f64 = score.parse().map_err(|_| StoreError::Corrupt {
        handle: handle.to_string(),
        reason: format!("score {score:?} is not a number"),
    })?;

    score_to_total(handle, score)
}

fn score_to_total(handle: &str, score: f64) -> Result<u64, StoreError> {
    if !score.is_finite() || score < 0.0 || score.fract() != 0.0 {
        return Err(StoreError::Corrupt {
            handle: handle.to_string(),
            reason: format!("score {score} is not a whole, non-negative number"),
        });
    }

    Ok(score as u64)
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn ensure_profile(&self, handle: &Handle) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.sadd(PROFILES_KEY, handle.as_str()).await?;

        Ok(())
    }

    async fn ensure_counter(&self, handle: &Handle) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(TOTALS_KEY)
            .arg("NX")
            .arg(0)
            .arg(handle.as_str())
            .ignore()
            .cmd("HSETNX")
            .arg(UPDATED_AT_KEY)
            .arg(handle.as_str())
            .arg(now())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_total(&self, handle: &Handle) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        let score: Option<f64> = conn.zscore(TOTALS_KEY, handle.as_str()).await?;

        score.map_or(Ok(0), |score| score_to_total(handle.as_str(), score))
    }

    async fn increment_by(
        &self,
        handle: &Handle,
        delta: PopCount,
        claim: Option<Uuid>,
    ) -> Result<Increment, StoreError> {
        let mut conn = self.connection.clone();
        let claim = claim.map(|c| c.to_string()).unwrap_or_default();

        let (total, applied): (String, i64) = self
            .increment
            .key(TOTALS_KEY)
            .key(UPDATED_AT_KEY)
            .key(CLAIMS_KEY)
            .arg(handle.as_str())
            .arg(delta.get())
            .arg(claim)
            .arg(now())
            .invoke_async(&mut conn)
            .await?;

        Ok(Increment {
            total: parse_total(handle.as_str(), &total)?,
            applied: applied == 1,
        })
    }

    async fn write_total(&self, handle: &Handle, total: u64) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();

        redis::pipe()
            .atomic()
            .zadd(TOTALS_KEY, handle.as_str(), total)
            .ignore()
            .hset(UPDATED_AT_KEY, handle.as_str(), now())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn last_claim(&self, handle: &Handle) -> Result<Option<Uuid>, StoreError> {
        let mut conn = self.connection.clone();
        let claim: Option<String> = conn.hget(CLAIMS_KEY, handle.as_str()).await?;

        // An unreadable id can never match a fresh claim, so treat it as absent.
        Ok(claim.and_then(|claim| Uuid::parse_str(&claim).ok()))
    }

    async fn record_claim(&self, handle: &Handle, claim: Uuid) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .hset(CLAIMS_KEY, handle.as_str(), claim.to_string())
            .await?;

        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let rows: Vec<(String, f64)> = conn.zrevrange_withscores(TOTALS_KEY, 0, stop).await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let timestamps: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(UPDATED_AT_KEY)
            .arg(rows.iter().map(|(handle, _)| handle.as_str()).collect::<Vec<_>>())
            .query_async(&mut conn)
            .await?;

        rows.into_iter()
            .zip(timestamps)
            .map(|((handle, score), updated_at)| {
                Ok(LeaderboardEntry {
                    total: score_to_total(&handle, score)?,
                    updated_at: parse_timestamp(updated_at),
                    handle,
                })
            })
            .collect()
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(ALL_KEYS.to_vec()).await?;

        Ok(())
    }
}
