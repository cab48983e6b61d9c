//! Integration tests for the GraphQL subgraph client using a mock Axum server.
//!
//! Tests cover:
//! - Cursor pagination and its stop condition
//! - Block-pinned pool lookups
//! - GraphQL `errors` and HTTP failures surfacing as upstream errors after retries

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use balancer_dex_screener::settings::SubgraphSettings;
use balancer_dex_screener::subgraph::{GraphQlSubgraphClient, SubgraphClient};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

#[derive(Clone, Default)]
struct TestServerState {
    requests: Arc<Mutex<Vec<Value>>>,
    swap_count: usize,
}

fn swap_json(n: usize) -> Value {
    json!({
        "id": format!("0x{:04x}", n),
        "pool": "0x85b2b559bc2d21104c4defdd6efca8a20343361d",
        "tokenIn": "0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0",
        "tokenOut": "0xae7ab96520de3a18e5e111b5eaab095312d7fe84",
        "tokenAmountIn": "1.5",
        "tokenAmountOut": "1.7",
        "blockNumber": "100",
        "blockTimestamp": "1700000000",
        "transactionHash": format!("0xtx{n}"),
        "logIndex": "3",
        "user": { "id": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed" }
    })
}

fn pool_json(block: Option<u64>) -> Value {
    let balance = block.map_or("999".to_string(), |b| b.to_string());
    json!({
        "address": "0x85b2b559bc2d21104c4defdd6efca8a20343361d",
        "name": "Test Pool",
        "symbol": "TP",
        "swapFee": "0.003",
        "createdAtBlock": "10",
        "createdAtTimestamp": "1600000000",
        "createdAtTx": "0xcreate",
        "creator": "0xba12222222228d8ba445958a75a0704d566bf2c8",
        "tokens": [
            { "address": "0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0", "name": "A", "symbol": "A", "decimals": 18, "balance": balance },
            { "address": "0xae7ab96520de3a18e5e111b5eaab095312d7fe84", "name": "B", "symbol": "B", "decimals": "18", "balance": "1" }
        ]
    })
}

async fn handle_graphql(
    State(state): State<Arc<TestServerState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.lock().await.push(body.clone());
    let query = body["query"].as_str().unwrap_or_default();
    let variables = &body["variables"];

    if query.contains("_meta") {
        return Json(json!({ "data": { "_meta": { "block": { "number": 123, "timestamp": 1700000123 } } } }));
    }
    if query.contains("pool(id:") {
        let block = variables["block"]["number"].as_u64();
        return Json(json!({ "data": { "pool": pool_json(block) } }));
    }
    if query.contains("addRemoves") {
        return Json(json!({ "data": { "items": [] } }));
    }

    let first = variables["first"].as_u64().unwrap_or(1000) as usize;
    let last_id = variables["lastId"].as_str().unwrap_or("0x").to_string();
    let items: Vec<Value> = (1..=state.swap_count)
        .map(swap_json)
        .filter(|s| s["id"].as_str().unwrap_or_default() > last_id.as_str())
        .take(first)
        .collect();
    Json(json!({ "data": { "items": items } }))
}

async fn handle_errors(State(state): State<Arc<TestServerState>>) -> Json<Value> {
    state.requests.lock().await.push(Value::Null);
    Json(json!({ "data": null, "errors": [{ "message": "indexing error" }] }))
}

async fn handle_down(State(state): State<Arc<TestServerState>>) -> impl IntoResponse {
    state.requests.lock().await.push(Value::Null);
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn start_test_server(state: Arc<TestServerState>) -> SocketAddr {
    let router = Router::new()
        .route("/graphql", post(handle_graphql))
        .route("/errors", post(handle_errors))
        .route("/down", post(handle_down))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    addr
}

fn settings(page_size: usize) -> SubgraphSettings {
    SubgraphSettings {
        page_size,
        qps_limit: 1000,
        max_retries: 2,
        retry_base_delay_ms: 2,
        timeout_seconds: 5,
    }
}

fn client(addr: SocketAddr, path: &str, page_size: usize) -> GraphQlSubgraphClient {
    let endpoint = Url::parse(&format!("http://{addr}{path}")).unwrap();
    GraphQlSubgraphClient::new(endpoint, &settings(page_size)).unwrap()
}

#[tokio::test]
async fn test_swaps_paginate_until_short_page() {
    let state = Arc::new(TestServerState {
        swap_count: 5,
        ..Default::default()
    });
    let addr = start_test_server(state.clone()).await;

    let swaps = client(addr, "/graphql", 2).swaps(90, 110).await.unwrap();
    assert_eq!(swaps.len(), 5);
    assert_eq!(swaps[4].id, "0x0005");
    assert_eq!(swaps[0].block_number, 100);
    assert_eq!(swaps[0].user, "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");

    let requests = state.requests.lock().await;
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0]["variables"]["lastId"], "0x");
    assert_eq!(requests[1]["variables"]["lastId"], "0x0002");
    assert_eq!(requests[2]["variables"]["lastId"], "0x0004");
    assert_eq!(requests[0]["variables"]["fromBlock"], "90");
    assert_eq!(requests[0]["variables"]["toBlock"], "110");
}

#[tokio::test]
async fn test_full_last_page_needs_one_more_request() {
    let state = Arc::new(TestServerState {
        swap_count: 4,
        ..Default::default()
    });
    let addr = start_test_server(state.clone()).await;

    let swaps = client(addr, "/graphql", 2).swaps(1, 1).await.unwrap();
    assert_eq!(swaps.len(), 4);
    assert_eq!(state.requests.lock().await.len(), 3);
}

#[tokio::test]
async fn test_empty_listing() {
    let state = Arc::new(TestServerState::default());
    let addr = start_test_server(state.clone()).await;

    let records = client(addr, "/graphql", 1000)
        .add_removes(1, 2)
        .await
        .unwrap();
    assert!(records.is_empty());
    assert_eq!(state.requests.lock().await.len(), 1);
}

#[tokio::test]
async fn test_pool_lookup_pins_block() {
    let state = Arc::new(TestServerState::default());
    let addr = start_test_server(state.clone()).await;
    let client = client(addr, "/graphql", 1000);

    let pinned = client
        .pool("0x85B2b559bC2D21104C4DEFdd6EFcA8A20343361D", Some(4242))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pinned.tokens[0].balance, "4242");
    assert_eq!(pinned.tokens[1].decimals, 18);
    assert_eq!(pinned.created_at_block, 10);
    assert_eq!(pinned.swap_fee, "0.003");

    let latest = client
        .pool("0x85b2b559bc2d21104c4defdd6efca8a20343361d", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.tokens[0].balance, "999");

    let requests = state.requests.lock().await;
    assert_eq!(
        requests[0]["variables"]["id"],
        "0x85b2b559bc2d21104c4defdd6efca8a20343361d"
    );
    assert_eq!(requests[0]["variables"]["block"]["number"], 4242);
    assert!(requests[1]["variables"]["block"].is_null());
}

#[tokio::test]
async fn test_latest_block() {
    let addr = start_test_server(Arc::new(TestServerState::default())).await;
    let meta = client(addr, "/graphql", 1000).latest_block().await.unwrap();
    assert_eq!(meta.number, 123);
    assert_eq!(meta.timestamp, Some(1_700_000_123));
}

#[tokio::test]
async fn test_graphql_errors_are_upstream_failures() {
    let state = Arc::new(TestServerState::default());
    let addr = start_test_server(state.clone()).await;

    let err = client(addr, "/errors", 1000).swaps(1, 2).await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("indexing error"));
    // One attempt plus two retries.
    assert_eq!(state.requests.lock().await.len(), 3);
}

#[tokio::test]
async fn test_http_failure_is_upstream_after_retries() {
    let state = Arc::new(TestServerState::default());
    let addr = start_test_server(state.clone()).await;

    let err = client(addr, "/down", 1000).latest_block().await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("500"));
    assert_eq!(state.requests.lock().await.len(), 3);
}
