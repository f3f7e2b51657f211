use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use super::{
    config::{Config, StoreBackend},
    database::{RedisStore, init_redis},
    limiter::{FixedWindow, RateLimiter},
    memory::MemoryStore,
    store::{Counter, CounterStore, IncrementMode},
};

pub struct AppState {
    pub config: Config,
    pub counter: Counter,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let store: Arc<dyn CounterStore> = match config.store {
            StoreBackend::Redis => {
                info!("Connecting to Redis...");
                Arc::new(RedisStore::new(init_redis(&config.redis_url).await?))
            }
            StoreBackend::Memory => {
                warn!("Using the in-memory store, totals are lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn CounterStore>) -> Arc<Self> {
        if config.increment_mode == IncrementMode::ReadModifyWrite {
            warn!("Read-modify-write increments enabled, concurrent pops for one handle can be lost");
        }

        let counter = Counter::new(store, config.increment_mode);
        let limiter = Arc::new(FixedWindow::new(config.rate_limit_window, config.rate_limit_max));

        Arc::new(Self {
            config,
            counter,
            limiter,
        })
    }
}
