//! # Screener Server
//!
//! HTTP front end for the Balancer DEX Screener adapter.
//!
//! ## Routes
//!
//! - `GET /chains`
//! - `GET /{chain}/latest-block`
//! - `GET /{chain}/asset?id=0x...`
//! - `GET /{chain}/pair?id=<pool>-<asset0>-<asset1>`
//! - `GET /{chain}/events?fromBlock=N&toBlock=M`
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin screener_server -- --config Config.toml
//! ```

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use balancer_dex_screener::{metrics, settings::LogSettings, ScreenerError, ScreenerHub, Settings};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "screener_server", about = "DEX Screener adapter for Balancer V3")]
struct Args {
    /// Config file (TOML). Defaults to $SCREENER_CONFIG or Config.toml.
    #[arg(long)]
    config: Option<String>,

    /// Overrides server.bind_address.
    #[arg(long)]
    bind: Option<String>,
}

struct ApiError(ScreenerError);

impl From<ScreenerError> for ApiError {
    fn from(err: ScreenerError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &ScreenerError) -> StatusCode {
    match err {
        ScreenerError::Format(_) | ScreenerError::AddressFormat(_) => StatusCode::BAD_REQUEST,
        ScreenerError::NotFound(_) | ScreenerError::UnsupportedChain(_) => StatusCode::NOT_FOUND,
        ScreenerError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            log::error!("{}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsQuery {
    from_block: u64,
    to_block: u64,
}

async fn list_chains(State(hub): State<Arc<ScreenerHub>>) -> Json<serde_json::Value> {
    Json(json!({ "chains": hub.supported_chains() }))
}

async fn latest_block(
    State(hub): State<Arc<ScreenerHub>>,
    Path(chain): Path<String>,
) -> ApiResult<balancer_dex_screener::types::responses::LatestBlockResponse> {
    Ok(Json(hub.screener(&chain)?.latest_block().await?))
}

async fn asset(
    State(hub): State<Arc<ScreenerHub>>,
    Path(chain): Path<String>,
    Query(query): Query<IdQuery>,
) -> ApiResult<balancer_dex_screener::types::responses::AssetResponse> {
    Ok(Json(hub.screener(&chain)?.asset(&query.id).await?))
}

async fn pair(
    State(hub): State<Arc<ScreenerHub>>,
    Path(chain): Path<String>,
    Query(query): Query<IdQuery>,
) -> ApiResult<balancer_dex_screener::types::responses::PairResponse> {
    Ok(Json(hub.screener(&chain)?.pair(&query.id).await?))
}

async fn events(
    State(hub): State<Arc<ScreenerHub>>,
    Path(chain): Path<String>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<balancer_dex_screener::types::responses::EventsResponse> {
    let screener = hub.screener(&chain)?;
    Ok(Json(screener.events(query.from_block, query.to_block).await?))
}

fn router(hub: Arc<ScreenerHub>) -> Router {
    Router::new()
        .route("/chains", get(list_chains))
        .route("/:chain/latest-block", get(latest_block))
        .route("/:chain/asset", get(asset))
        .route("/:chain/pair", get(pair))
        .route("/:chain/events", get(events))
        .with_state(hub)
}

#[cfg(feature = "observability")]
fn init_logging(log: &LogSettings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(not(feature = "observability"))]
fn init_logging(log: &LogSettings) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&log.level)).init();
}

#[cfg(feature = "observability")]
fn init_metrics(settings: &Settings) -> Result<()> {
    if let Some(addr) = &settings.server.metrics_bind_address {
        let addr: std::net::SocketAddr = addr.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        log::info!("Prometheus metrics on http://{}/metrics", addr);
    }
    metrics::describe_metrics();
    Ok(())
}

#[cfg(not(feature = "observability"))]
fn init_metrics(_settings: &Settings) -> Result<()> {
    metrics::describe_metrics();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::from_path(path)?,
        None => Settings::new()?,
    };
    init_logging(&settings.log);
    init_metrics(&settings)?;

    let hub = Arc::new(ScreenerHub::from_settings(&settings)?);
    if hub.supported_chains().is_empty() {
        log::warn!("No chains configured; every chain route will return 404");
    }
    log::info!("Serving chains: {:?}", hub.supported_chains());

    let bind_address = args.bind.unwrap_or(settings.server.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(hub))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            log::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&ScreenerError::Format("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ScreenerError::AddressFormat("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ScreenerError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ScreenerError::UnsupportedChain("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ScreenerError::subgraph("down")),
            StatusCode::BAD_GATEWAY
        );
    }
}
