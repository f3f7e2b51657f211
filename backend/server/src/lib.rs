//! Documentation of the POPDOG pop counter backend.
//!
//! Users pop a dog in the browser, pops pile up locally, and a claim sends the
//! pile to this server in one request. The server keeps the authoritative total
//! per handle and serves the leaderboard.
//!
//!
//!
//! # General Infrastructure
//! - User goes to the VPS public endpoint running the reverse proxy
//! - Reverse proxy forwards `/api/*` into this container and sets `X-Forwarded-For`
//! - This server talks to Redis over the internal network, Redis is never exposed
//! - Static pages, images and social login are served elsewhere
//!
//!
//!
//! # Endpoints
//!
//! | Method/Path | Body / Query | Response |
//! |---|---|---|
//! | `POST /register` | `{handle}` | `{handle}` |
//! | `GET /me` | `?handle=` | `{total}` |
//! | `POST /pop` | `{handle}` | `{handle, total}` |
//! | `POST /pop/batch` | `{handle, count, claim_id?}` | `{handle, total, duplicate?}` |
//! | `GET /leaderboard` | `?limit=` | `{leaderboard: [{handle, total, updated_at}]}` |
//! | `POST /admin/reset` | `{secret}` | `{success, message}` |
//!
//! Errors come back as `{error}` with 400 (bad handle, count or JSON), 401 (bad
//! admin secret), 429 (throttled) or 500 (store failure).
//!
//!
//!
//! # Preventing Cheating
//!
//! **Goal**: Keep the leaderboard roughly honest without accounts or captchas.
//!
//! - Pops are counted in the browser and reset to zero on every page load, so
//!   a reload without claiming throws them away
//! - A claim is capped at 1,000,000 pops
//! - Single pops (`/pop`) are throttled to 20 per 10 seconds per origin and handle
//! - The browser checks handles for UX only, every request is checked again here
//!
//!
//!
//! # Notes
//!
//! ## Lost updates
//! Redis applies increments atomically. The read-modify-write fallback
//! (`INCREMENT_MODE=read_modify_write`) exists for stores without an atomic
//! increment and can lose one of two simultaneous increments for a handle.
//!
//! ## Double claims
//! A claim whose response never arrives may or may not have been applied. Without
//! a `claim_id` a retry counts twice. With one, the retry is answered with the
//! current total and `duplicate: true`.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://localhost:6379 RUST_LOG=info cargo run -p popdog
//! ```
//!
//! Run without Redis, totals are lost on exit.
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=info cargo run -p popdog
//! ```
//!
//! Environment:
//! - `RUST_PORT` (1111)
//! - `STORE_BACKEND` (`redis` or `memory`)
//! - `REDIS_URL` (`redis://redis:6379`)
//! - `INCREMENT_MODE` (`atomic` or `read_modify_write`)
//! - `RATE_LIMIT_WINDOW_SECS` (10), `RATE_LIMIT_MAX` (20)
//! - `ADMIN_RESET_SECRET`, read from `/run/secrets/ADMIN_RESET_SECRET` first
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tokio::{net::TcpListener, signal::ctrl_c, time::interval};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod limiter;
pub mod memory;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use config::Config;
use routes::{
    batch_handler, leaderboard_handler, me_handler, pop_handler, register_handler, reset_handler,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/register", post(register_handler))
        .route("/me", get(me_handler))
        .route("/pop", post(pop_handler))
        .route("/pop/batch", post(batch_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/admin/reset", post(reset_handler))
        .layer(cors)
        .with_state(state)
}

/// Periodically drops expired rate-limit buckets so idle keys do not pile up.
pub fn spawn_limiter_sweep(state: Arc<AppState>) {
    let period = state.config.rate_limit_window.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = interval(period);

        loop {
            ticker.tick().await;

            let dropped = state.limiter.sweep();
            if dropped > 0 {
                debug!("Dropped {dropped} expired rate limit buckets");
            }
        }
    });
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");
    spawn_limiter_sweep(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
