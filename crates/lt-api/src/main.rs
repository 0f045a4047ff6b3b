//! LoadTrace HTTP API Service
//!
//! Entry point for the LoadTrace RCA server. Exposes:
//! - `POST /api/v1/investigations/stream` — run an investigation, streaming
//!   progress events over SSE
//! - `POST /api/v1/investigations` — run an investigation to completion and
//!   return the final verdict
//! - `POST /api/v1/route/explain` — routing decision only, no probes
//! - `GET /health` — liveness

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lt_adapters::{
    CannedSource, DocSearchSource, HttpOracle, LogSearchSource, NetworkApiSource, OracleConfig,
    PlatformApiSource, PortalHistorySource, StaticOracle, WarehouseSource, WebhookHistorySource,
};
use lt_adapters::sources::{
    docs::DocSearchConfig, logs::LogSearchConfig, network::NetworkApiConfig,
    platform::PlatformApiConfig, portal::PortalHistoryConfig, warehouse::WarehouseConfig,
    webhook::WebhookHistoryConfig,
};
use lt_domain::InvestigationConfig;
use lt_engine::SourceRegistry;
use lt_ports::ReasoningOracle;

mod handlers;

use handlers::investigate;

/// Shared application state: the registry and oracle are built once at boot
/// and shared across investigations; everything per-run lives in the
/// investigation context.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InvestigationConfig>,
    pub registry: Arc<SourceRegistry>,
    pub oracle: Arc<dyn ReasoningOracle>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Register every data source whose configuration is present; presence of a
/// source's env config is its feature toggle.
fn build_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    let mut registered = 0usize;

    if let Some(config) = PlatformApiConfig::from_env() {
        registry.register(Arc::new(PlatformApiSource::new(config)));
        registered += 1;
    }
    if let Some(config) = NetworkApiConfig::from_env() {
        registry.register(Arc::new(NetworkApiSource::new(config)));
        registered += 1;
    }
    if let Some(config) = WarehouseConfig::from_env() {
        match WarehouseSource::connect(&config) {
            Ok(source) => {
                registry.register(Arc::new(source));
                registered += 1;
            }
            Err(e) => warn!(error = %e, "warehouse pool configuration invalid, skipping"),
        }
    }
    if let Some(config) = PortalHistoryConfig::from_env() {
        registry.register(Arc::new(PortalHistorySource::new(config)));
        registered += 1;
    }
    if let Some(config) = WebhookHistoryConfig::from_env() {
        registry.register(Arc::new(WebhookHistorySource::new(config)));
        registered += 1;
    }
    if let Some(config) = LogSearchConfig::from_env() {
        registry.register(Arc::new(LogSearchSource::new(config)));
        registered += 1;
    }
    if let Some(config) = DocSearchConfig::from_env() {
        registry.register(Arc::new(DocSearchSource::new(config)));
        registered += 1;
    }

    if registered == 0 {
        warn!("no data sources configured, registering canned demo sources");
        register_demo_sources(&mut registry);
    }

    registry
}

/// Demo data covering the common "load exists but has no tracking method"
/// shape, so a bare `lt-api` boot can stream a full investigation.
fn register_demo_sources(registry: &mut SourceRegistry) {
    registry.register(Arc::new(
        CannedSource::new("platform")
            .with_payload(
                "platform-load-lookup-by-id",
                serde_json::json!({
                    "tracking_id": 607485162,
                    "load_number": "U110123982",
                    "status": "Awaiting Tracking Info",
                    "mode": "TL",
                    "shipper_id": "walmart",
                    "carrier_id": "hardy-brothers",
                    "subscription_id": "sub-204"
                }),
            )
            .with_payload(
                "platform-load-lookup-by-number",
                serde_json::json!({
                    "tracking_id": 607485162,
                    "load_number": "U110123982",
                    "status": "Awaiting Tracking Info",
                    "mode": "TL",
                    "shipper_id": "walmart",
                    "carrier_id": "hardy-brothers",
                    "subscription_id": "sub-204"
                }),
            ),
    ));
    registry.register(Arc::new(CannedSource::new("network").with_payload(
        "network-relationship",
        serde_json::json!({
            "active": true,
            "eld_enabled": false,
            "tracking_methods": []
        }),
    )));
    registry.register(Arc::new(CannedSource::new("portal").with_payload(
        "carrier-portal-scrape-history",
        serde_json::json!({ "events": 42, "errors": 0 }),
    )));
}

fn build_oracle() -> Arc<dyn ReasoningOracle> {
    match OracleConfig::from_env() {
        Some(config) => {
            info!(model = %config.model, "using HTTP reasoning oracle");
            Arc::new(HttpOracle::new(config))
        }
        None => {
            warn!("ORACLE_BASE_URL not set, using the deterministic static oracle");
            Arc::new(StaticOracle::new())
        }
    }
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/investigations",
            post(investigate::investigate),
        )
        .route(
            "/api/v1/investigations/stream",
            post(investigate::investigate_stream),
        )
        .route("/api/v1/route/explain", post(investigate::route_explain))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lt_api=debug,lt_engine=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState {
        config: Arc::new(InvestigationConfig::from_env()),
        registry: Arc::new(build_registry()),
        oracle: build_oracle(),
    };

    info!(
        capabilities = state.registry.capability_refs().len(),
        "source registry ready"
    );

    let app = create_router(state);
    let addr = std::env::var("LT_API_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind API listener");

    info!("LoadTrace API listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
