//! # Rate Limiting
//!
//! Fixed window counter per throttle key, where a key is the client origin and
//! the handle (`{origin}:{handle}`). Only single pops are throttled, batches
//! are bounded by their count instead.
//!
//! ## Notes
//!
//! - A stale window is thrown away whole, not rolled over. A client can get up
//!   to twice the capacity through around a window boundary.
//! - Buckets live in this process only. Several server instances each keep
//!   their own map, and a restart forgets everything (fails open).
//! - Callers only see [`RateLimiter`], so a shared limiter can replace this one.
use std::time::{Duration, Instant};

use dashmap::DashMap;

pub trait RateLimiter: Send + Sync {
    fn allow(&self, key: &str) -> bool;

    /// Drops expired state. Returns how many keys were dropped.
    fn sweep(&self) -> usize {
        0
    }
}

struct Bucket {
    count: u32,
    reset: Instant,
}

pub struct FixedWindow {
    window: Duration,
    capacity: u32,
    buckets: DashMap<String, Bucket>,
}

impl FixedWindow {
    pub fn new(window: Duration, capacity: u32) -> Self {
        Self {
            window,
            capacity,
            buckets: DashMap::new(),
        }
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                count: 0,
                reset: now + self.window,
            });

        if now > bucket.reset {
            bucket.count = 0;
            bucket.reset = now + self.window;
        }

        bucket.count = bucket.count.saturating_add(1);
        bucket.count <= self.capacity
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| now <= bucket.reset);

        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl RateLimiter for FixedWindow {
    fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}
