use std::{sync::Arc, time::Duration};

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use server::{app, config::Config, memory::MemoryStore, state::AppState};
use tokio::net::TcpListener;

const SECRET: &str = "let-me-reset";

async fn spawn(config: Config) -> String {
    let state = AppState::with_store(config, Arc::new(MemoryStore::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    format!("http://{address}")
}

async fn post(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response = Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();

    (status, response.json().await.unwrap())
}

async fn get(base: &str, path: &str) -> (StatusCode, Value) {
    let response = reqwest::get(format!("{base}{path}")).await.unwrap();
    let status = response.status();

    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn register_strips_at_and_starts_at_zero() {
    let base = spawn(Config::local(None)).await;

    let (status, body) = post(&base, "/register", json!({ "handle": "@alice" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "handle": "alice" }));

    let (_, body) = get(&base, "/leaderboard").await;
    assert_eq!(body["leaderboard"][0]["handle"], "alice");
    assert_eq!(body["leaderboard"][0]["total"], 0);
}

#[tokio::test]
async fn register_does_not_lower_an_existing_total() {
    let base = spawn(Config::local(None)).await;

    post(&base, "/pop/batch", json!({ "handle": "alice", "count": 9 })).await;
    post(&base, "/register", json!({ "handle": "alice" })).await;

    let (_, body) = get(&base, "/me?handle=alice").await;
    assert_eq!(body, json!({ "total": 9 }));
}

#[tokio::test]
async fn rejects_invalid_handles() {
    let base = spawn(Config::local(None)).await;

    for body in [json!({ "handle": "bad-name" }), json!({ "handle": "" }), json!({})] {
        let (status, response) = post(&base, "/register", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "error": "Invalid handle" }));
    }

    let (status, _) = post(&base, "/pop", json!({ "handle": "toolonghandle1234" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&base, "/me?handle=bad-name").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&base, "/me").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let base = spawn(Config::local(None)).await;

    let response = Client::new()
        .post(format!("{base}/pop/batch"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_handle_total_is_zero() {
    let base = spawn(Config::local(None)).await;

    let (status, body) = get(&base, "/me?handle=nobody").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total": 0 }));
}

#[tokio::test]
async fn single_pops_count_up() {
    let base = spawn(Config::local(None)).await;

    for expected in 1..=3 {
        let (status, body) = post(&base, "/pop", json!({ "handle": "alice" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "handle": "alice", "total": expected }));
    }
}

#[tokio::test]
async fn single_pops_are_throttled_per_origin_and_handle() {
    let base = spawn(Config::local(None)).await;
    let client = Client::new();

    let pop = |origin: &'static str, handle: &'static str| {
        client
            .post(format!("{base}/pop"))
            .header("x-forwarded-for", origin)
            .json(&json!({ "handle": handle }))
            .send()
    };

    for _ in 0..20 {
        assert_eq!(pop("203.0.113.7", "alice").await.unwrap().status(), StatusCode::OK);
    }

    let throttled = pop("203.0.113.7", "alice").await.unwrap();
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = throttled.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("popping too fast"));

    assert_eq!(pop("203.0.113.8", "alice").await.unwrap().status(), StatusCode::OK);
    assert_eq!(pop("203.0.113.7", "bob").await.unwrap().status(), StatusCode::OK);

    let (_, body) = get(&base, "/me?handle=alice").await;
    assert_eq!(body, json!({ "total": 21 }));
}

#[tokio::test]
async fn throttle_lifts_after_the_window() {
    let mut config = Config::local(None);
    config.rate_limit_window = Duration::from_millis(200);
    config.rate_limit_max = 2;
    let base = spawn(config).await;

    for _ in 0..2 {
        let (status, _) = post(&base, "/pop", json!({ "handle": "alice" })).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = post(&base, "/pop", json!({ "handle": "alice" })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let (status, body) = post(&base, "/pop", json!({ "handle": "alice" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn batch_adds_count_to_total() {
    let base = spawn(Config::local(None)).await;

    post(&base, "/pop/batch", json!({ "handle": "alice", "count": 10 })).await;
    let (status, body) = post(&base, "/pop/batch", json!({ "handle": "alice", "count": 5 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "handle": "alice", "total": 15 }));
}

#[tokio::test]
async fn batch_is_not_throttled() {
    let base = spawn(Config::local(None)).await;

    for _ in 0..25 {
        let (status, _) = post(&base, "/pop/batch", json!({ "handle": "alice", "count": 1 })).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn batch_rejects_out_of_range_counts() {
    let base = spawn(Config::local(None)).await;

    for count in [json!(0), json!(-4), json!(1_000_001), json!(null), json!("7"), json!(2.5)] {
        let (status, body) = post(&base, "/pop/batch", json!({ "handle": "alice", "count": count })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "count {count}");
        assert_eq!(body, json!({ "error": "Invalid count (must be 1-1000000)" }));
    }

    let (status, body) = post(&base, "/pop/batch", json!({ "handle": "alice", "count": 1_000_000 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1_000_000);
}

#[tokio::test]
async fn batch_accepts_whole_float_counts() {
    let base = spawn(Config::local(None)).await;

    let (status, body) = post(&base, "/pop/batch", json!({ "handle": "alice", "count": 7.0 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 7);
}

#[tokio::test]
async fn repeated_batch_without_claim_id_counts_twice() {
    let base = spawn(Config::local(None)).await;
    let claim = json!({ "handle": "alice", "count": 7 });

    post(&base, "/pop/batch", claim.clone()).await;
    let (_, body) = post(&base, "/pop/batch", claim).await;

    assert_eq!(body["total"], 14);
}

#[tokio::test]
async fn repeated_batch_with_claim_id_is_applied_once() {
    let base = spawn(Config::local(None)).await;
    let claim = json!({
        "handle": "alice",
        "count": 7,
        "claim_id": "5b3c3f0e-8a53-4c11-9a0e-2d6f3b7a9c41",
    });

    let (_, first) = post(&base, "/pop/batch", claim.clone()).await;
    let (status, retry) = post(&base, "/pop/batch", claim).await;

    assert_eq!(first, json!({ "handle": "alice", "total": 7 }));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retry, json!({ "handle": "alice", "total": 7, "duplicate": true }));
}

#[tokio::test]
async fn leaderboard_orders_by_total_and_honours_limit() {
    let base = spawn(Config::local(None)).await;

    for (handle, count) in [("a", 5), ("b", 20), ("c", 1)] {
        post(&base, "/pop/batch", json!({ "handle": handle, "count": count })).await;
    }

    let (status, body) = get(&base, "/leaderboard").await;
    assert_eq!(status, StatusCode::OK);

    let rows = body["leaderboard"].as_array().unwrap();
    let order: Vec<(&str, u64)> = rows
        .iter()
        .map(|row| (row["handle"].as_str().unwrap(), row["total"].as_u64().unwrap()))
        .collect();
    assert_eq!(order, vec![("b", 20), ("a", 5), ("c", 1)]);
    assert!(rows.iter().all(|row| row["updated_at"].is_string()));

    let (_, body) = get(&base, "/leaderboard?limit=2").await;
    assert_eq!(body["leaderboard"].as_array().unwrap().len(), 2);

    let (status, body) = get(&base, "/leaderboard?limit=lots").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["leaderboard"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn reset_requires_the_configured_secret() {
    let base = spawn(Config::local(Some(SECRET))).await;

    post(&base, "/pop/batch", json!({ "handle": "alice", "count": 3 })).await;

    let (status, body) = post(&base, "/admin/reset", json!({ "secret": "guess" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let (status, _) = post(&base, "/admin/reset", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(&base, "/admin/reset", json!({ "secret": SECRET })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Leaderboard wiped successfully" }));

    let (_, body) = get(&base, "/leaderboard").await;
    assert_eq!(body, json!({ "leaderboard": [] }));
}

#[tokio::test]
async fn reset_is_disabled_without_a_secret() {
    let base = spawn(Config::local(None)).await;

    let (status, _) = post(&base, "/admin/reset", json!({ "secret": "" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(&base, "/admin/reset", json!({ "secret": "popdog-reset-2025" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
