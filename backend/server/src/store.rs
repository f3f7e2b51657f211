//! # Counter Store
//!
//! Authoritative handle -> total pops mapping.
//!
//! ## Layout
//!
//! - Profiles: set of registered handles
//! - Counters: handle -> (total, updated at)
//! - Claims: handle -> last applied claim id
//!
//! ## Increments
//!
//! Stores implement an atomic increment (Redis runs it as one script, the memory
//! store under one lock). [`Counter`] uses it unless configured for the
//! two-step read-modify-write fallback, which can lose an increment when two
//! requests for the same handle interleave between the read and the write.
//! That race is kept on purpose as the fallback's documented limitation.
//!
//! ## Claims
//!
//! A batch can carry a claim id. If it equals the last id applied for the
//! handle, the batch is reported as a duplicate and not applied again.
//! Batches without one are always applied, so a retried claim can count twice.
use std::{str::FromStr, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{Handle, PopCount, payloads::LeaderboardEntry};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record for {handle}: {reason}")]
    Corrupt { handle: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub total: u64,
    pub applied: bool,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Idempotent, a no-op for known handles.
    async fn ensure_profile(&self, handle: &Handle) -> Result<(), StoreError>;

    /// Creates a zero counter if the handle has none. Never lowers a total.
    async fn ensure_counter(&self, handle: &Handle) -> Result<(), StoreError>;

    /// Unknown handles have a total of 0.
    async fn get_total(&self, handle: &Handle) -> Result<u64, StoreError>;

    /// Adds `delta` in one atomic step, skipping it if `claim` was the last
    /// claim applied for this handle.
    async fn increment_by(
        &self,
        handle: &Handle,
        delta: PopCount,
        claim: Option<Uuid>,
    ) -> Result<Increment, StoreError>;

    /// Overwrites the total and its timestamp. Only the fallback path uses this.
    async fn write_total(&self, handle: &Handle, total: u64) -> Result<(), StoreError>;

    async fn last_claim(&self, handle: &Handle) -> Result<Option<Uuid>, StoreError>;

    async fn record_claim(&self, handle: &Handle, claim: Uuid) -> Result<(), StoreError>;

    /// Highest totals first.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;

    /// Removes every profile, counter and claim.
    async fn reset(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementMode {
    Atomic,
    ReadModifyWrite,
}

impl FromStr for IncrementMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "read_modify_write" => Ok(Self::ReadModifyWrite),
            other => Err(anyhow!(
                "unknown increment mode {other:?}, expected atomic or read_modify_write"
            )),
        }
    }
}

#[derive(Clone)]
pub struct Counter {
    store: Arc<dyn CounterStore>,
    mode: IncrementMode,
}

impl Counter {
    pub fn new(store: Arc<dyn CounterStore>, mode: IncrementMode) -> Self {
        Self { store, mode }
    }

    pub fn store(&self) -> &dyn CounterStore {
        self.store.as_ref()
    }

    pub fn mode(&self) -> IncrementMode {
        self.mode
    }

    pub async fn increment_by(
        &self,
        handle: &Handle,
        delta: PopCount,
        claim: Option<Uuid>,
    ) -> Result<Increment, StoreError> {
        match self.mode {
            IncrementMode::Atomic => self.store.increment_by(handle, delta, claim).await,
            IncrementMode::ReadModifyWrite => self.read_modify_write(handle, delta, claim).await,
        }
    }

    async fn read_modify_write(
        &self,
        handle: &Handle,
        delta: PopCount,
        claim: Option<Uuid>,
    ) -> Result<Increment, StoreError> {
        if let Some(claim) = claim {
            if self.store.last_claim(handle).await? == Some(claim) {
                debug!("Claim {claim} already applied for {handle}");

                return Ok(Increment {
                    total: self.store.get_total(handle).await?,
                    applied: false,
                });
            }
        }

        let current = self.store.get_total(handle).await?;
        let total = current.saturating_add(delta.get());
        self.store.write_total(handle, total).await?;

        if let Some(claim) = claim {
            self.store.record_claim(handle, claim).await?;
        }

        Ok(Increment {
            total,
            applied: true,
        })
    }
}
