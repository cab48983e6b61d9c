// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, gauge};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, gauge};

/// Registers metric descriptions. Call once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "subgraph_requests_total",
        "GraphQL requests sent to the subgraph, by query."
    );
    describe_counter!(
        "subgraph_request_failures_total",
        "Subgraph requests that failed after retries, by query."
    );
    describe_counter!("cache_hits_total", "Cache lookups served from memory.");
    describe_counter!("cache_miss_total", "Cache lookups that required a refresh.");
    describe_gauge!("cache_size_gauge", "Entries held by a cache.");
    describe_counter!(
        "reserves_lookup_failures_total",
        "Per-block pool snapshot lookups that degraded to null reserves."
    );
    describe_counter!(
        "normalized_events_total",
        "Normalized events emitted, by kind."
    );
}

pub fn increment_subgraph_request(query: &str) {
    counter!("subgraph_requests_total", 1, "query" => query.to_string());
}

pub fn increment_subgraph_failure(query: &str) {
    counter!("subgraph_request_failures_total", 1, "query" => query.to_string());
}

pub fn increment_cache_hit(cache_name: &str) {
    counter!("cache_hits_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("cache_miss_total", 1, "cache" => cache_name.to_string());
}

pub fn set_cache_size(cache_name: &str, size: f64) {
    gauge!("cache_size_gauge", size, "cache" => cache_name.to_string());
}

pub fn increment_reserves_lookup_failure() {
    counter!("reserves_lookup_failures_total", 1);
}

pub fn record_normalized_events(kind: &'static str, count: u64) {
    counter!("normalized_events_total", count, "kind" => kind);
}
