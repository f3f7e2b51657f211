//! In-process [`CounterStore`], used for local runs and tests.
//!
//! Nothing survives a restart. An optional latency is slept before every
//! operation to stand in for a network round trip.
use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::{Handle, PopCount, payloads::LeaderboardEntry};
use tokio::time::sleep;
use uuid::Uuid;

use crate::store::{CounterStore, Increment, StoreError};

struct CounterRecord {
    total: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    profiles: HashSet<String>,
    counters: HashMap<String, CounterRecord>,
    claims: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            tables: Mutex::default(),
            latency: Some(latency),
        }
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn ensure_profile(&self, handle: &Handle) -> Result<(), StoreError> {
        self.round_trip().await;
        self.tables.lock().profiles.insert(handle.to_string());

        Ok(())
    }

    async fn ensure_counter(&self, handle: &Handle) -> Result<(), StoreError> {
        self.round_trip().await;
        self.tables
            .lock()
            .counters
            .entry(handle.to_string())
            .or_insert_with(|| CounterRecord {
                total: 0,
                updated_at: Utc::now(),
            });

        Ok(())
    }

    async fn get_total(&self, handle: &Handle) -> Result<u64, StoreError> {
        self.round_trip().await;

        Ok(self
            .tables
            .lock()
            .counters
            .get(handle.as_str())
            .map_or(0, |record| record.total))
    }

    async fn increment_by(
        &self,
        handle: &Handle,
        delta: PopCount,
        claim: Option<Uuid>,
    ) -> Result<Increment, StoreError> {
        self.round_trip().await;

        let mut tables = self.tables.lock();

        if let Some(claim) = claim {
            if tables.claims.get(handle.as_str()) == Some(&claim) {
                let total = tables.counters.get(handle.as_str()).map_or(0, |r| r.total);

                return Ok(Increment {
                    total,
                    applied: false,
                });
            }

            tables.claims.insert(handle.to_string(), claim);
        }

        let record = tables
            .counters
            .entry(handle.to_string())
            .or_insert_with(|| CounterRecord {
                total: 0,
                updated_at: Utc::now(),
            });
        record.total = record.total.saturating_add(delta.get());
        record.updated_at = Utc::now();

        Ok(Increment {
            total: record.total,
            applied: true,
        })
    }

    async fn write_total(&self, handle: &Handle, total: u64) -> Result<(), StoreError> {
        self.round_trip().await;
        self.tables.lock().counters.insert(
            handle.to_string(),
            CounterRecord {
                total,
                updated_at: Utc::now(),
            },
        );

        Ok(())
    }

    async fn last_claim(&self, handle: &Handle) -> Result<Option<Uuid>, StoreError> {
        self.round_trip().await;

        Ok(self.tables.lock().claims.get(handle.as_str()).copied())
    }

    async fn record_claim(&self, handle: &Handle, claim: Uuid) -> Result<(), StoreError> {
        self.round_trip().await;
        self.tables.lock().claims.insert(handle.to_string(), claim);

        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.round_trip().await;

        let tables = self.tables.lock();
        let mut entries: Vec<LeaderboardEntry> = tables
            .counters
            .iter()
            .map(|(handle, record)| LeaderboardEntry {
                handle: handle.clone(),
                total: record.total,
                updated_at: Some(record.updated_at),
            })
            .collect();

        entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.handle.cmp(&b.handle)));
        entries.truncate(limit);

        Ok(entries)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.round_trip().await;
        *self.tables.lock() = Tables::default();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shared::{Handle, PopCount};

    use super::MemoryStore;
    use crate::store::CounterStore;

    fn handle(raw: &str) -> Handle {
        Handle::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_handle_total_is_zero() {
        let store = MemoryStore::new();

        assert_eq!(store.get_total(&handle("ghost")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_counter_keeps_existing_total() {
        let store = MemoryStore::new();
        let alice = handle("alice");

        store.ensure_counter(&alice).await.unwrap();
        assert_eq!(store.get_total(&alice).await.unwrap(), 0);

        store.increment_by(&alice, PopCount::new(4).unwrap(), None).await.unwrap();
        store.ensure_counter(&alice).await.unwrap();

        assert_eq!(store.get_total(&alice).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_total() {
        let store = MemoryStore::new();

        for (name, total) in [("a", 5), ("b", 20), ("c", 1)] {
            store
                .increment_by(&handle(name), PopCount::new(total).unwrap(), None)
                .await
                .unwrap();
        }

        let board = store.leaderboard(100).await.unwrap();
        let order: Vec<(&str, u64)> = board.iter().map(|e| (e.handle.as_str(), e.total)).collect();

        assert_eq!(order, vec![("b", 20), ("a", 5), ("c", 1)]);
        assert!(board.iter().all(|e| e.updated_at.is_some()));

        assert_eq!(store.leaderboard(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = MemoryStore::new();
        let alice = handle("alice");

        store.ensure_profile(&alice).await.unwrap();
        store.increment_by(&alice, PopCount::ONE, None).await.unwrap();
        store.reset().await.unwrap();

        assert_eq!(store.get_total(&alice).await.unwrap(), 0);
        assert!(store.leaderboard(10).await.unwrap().is_empty());
        assert_eq!(store.last_claim(&alice).await.unwrap(), None);
    }
}
