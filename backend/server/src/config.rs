use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::store::IncrementMode;

pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub redis_url: String,
    pub increment_mode: IncrementMode,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub admin_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown store backend {other:?}, expected redis or memory")),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let rate_limit_window_secs: u64 = try_load("RATE_LIMIT_WINDOW_SECS", "10")?;

        let admin_secret = read_secret("ADMIN_RESET_SECRET");
        if admin_secret.is_none() {
            warn!("ADMIN_RESET_SECRET not configured, /admin/reset will reject every request");
        }

        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            store: try_load("STORE_BACKEND", "redis")?,
            redis_url: try_load("REDIS_URL", "redis://redis:6379")?,
            increment_mode: try_load("INCREMENT_MODE", "atomic")?,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            rate_limit_max: try_load("RATE_LIMIT_MAX", "20")?,
            admin_secret,
        })
    }

    /// Settings for tests and local runs: memory store, default limits.
    pub fn local(admin_secret: Option<&str>) -> Self {
        Self {
            port: 0,
            store: StoreBackend::Memory,
            redis_url: String::new(),
            increment_mode: IncrementMode::Atomic,
            rate_limit_window: Duration::from_secs(10),
            rate_limit_max: 20,
            admin_secret: admin_secret.map(str::to_string),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse_value(key, &raw)
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: Display,
{
    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("Environment misconfigured: {key}={raw:?} ({e})")
    })
}

/// Docker secret first, then the environment. No default on purpose.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            info!("Failed to read {secret_name} from file: {e}, trying environment");
            var(secret_name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreBackend, parse_value};
    use crate::store::IncrementMode;

    #[test]
    fn test_store_backend() {
        assert_eq!(parse_value::<StoreBackend>("STORE_BACKEND", "redis").unwrap(), StoreBackend::Redis);
        assert_eq!(parse_value::<StoreBackend>("STORE_BACKEND", " Memory ").unwrap(), StoreBackend::Memory);
        assert!(parse_value::<StoreBackend>("STORE_BACKEND", "postgres").is_err());
    }

    #[test]
    fn test_increment_mode() {
        assert_eq!(
            parse_value::<IncrementMode>("INCREMENT_MODE", "read_modify_write").unwrap(),
            IncrementMode::ReadModifyWrite
        );
        assert_eq!(parse_value::<IncrementMode>("INCREMENT_MODE", "atomic").unwrap(), IncrementMode::Atomic);
        assert!(parse_value::<IncrementMode>("INCREMENT_MODE", "eventually").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_value::<u16>("RUST_PORT", "1111").unwrap(), 1111);
        assert!(parse_value::<u16>("RUST_PORT", "seventy").is_err());
        assert!(parse_value::<u32>("RATE_LIMIT_MAX", "-1").is_err());
    }
}
