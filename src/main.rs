//! ShopPulse API
//!
//! Backend for the ShopPulse merchant analytics dashboard. Connects a
//! Shopify store through the OAuth authorization-code flow, persists the
//! store linkage, and serves a rolling 30-day revenue summary aggregated
//! from the Shopify Admin REST API, with an append-only audit trail for
//! every connect, fetch, and disconnect.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    response::{Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

mod config;
mod database;
mod dates;
mod error;
mod metrics;
mod models;
mod oauth;
mod security;
mod shopify;

use config::Config;
use database::Database;
use error::{AppError, AppResult};
use metrics::MetricsService;
use models::{AuditEvent, AuthorizeUrlResponse, CallbackParams, ConnectShopRequest, MetricsSummary};
use oauth::OauthService;

/// Shared application state containing all service instances
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub oauth: Arc<OauthService>,
    pub metrics: Arc<MetricsService>,
}

/// Standard API response wrapper for consistent JSON responses
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful API response with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Health check response with system status information
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    services: ServiceStatus,
}

/// Status of individual services for health monitoring
#[derive(Serialize)]
struct ServiceStatus {
    database: bool,
}

/// Main entry point for the ShopPulse API
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting ShopPulse API");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    // Initialize services
    let database = Arc::new(Database::new(&config.database_url, 10).await?);
    database.migrate().await?;
    info!("Database connection established");

    let oauth = Arc::new(OauthService::new(config.clone(), database.clone()));
    let metrics = Arc::new(MetricsService::new(config.clone(), database.clone()));

    info!("All services initialized successfully");

    // Create application state
    let state = AppState {
        config: config.clone(),
        database,
        oauth,
        metrics,
    };

    // Build router
    let app = Router::new()
        // Health endpoint
        .route("/health", get(health_check))
        // OAuth flow
        .route("/auth/shopify", post(begin_oauth))
        .route("/auth/shopify/callback", get(oauth_callback))
        // Shop operations
        .route("/shops/:id/metrics", get(shop_metrics))
        .route("/shops/:id/audit", get(shop_audit))
        .route("/shops/:id/disconnect", post(disconnect_shop))
        // Add middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.server_address).await?;
    info!("Server listening on {}", config.server_address);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Returns the current health status of all system components
async fn health_check(State(state): State<AppState>) -> AppResult<Json<ApiResponse<HealthResponse>>> {
    let db_status = state.database.health_check().await.is_ok();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        services: ServiceStatus { database: db_status },
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Begins the OAuth flow for a submitted shop domain
async fn begin_oauth(
    State(state): State<AppState>,
    Json(payload): Json<ConnectShopRequest>,
) -> AppResult<Json<ApiResponse<AuthorizeUrlResponse>>> {
    let response = state.oauth.begin(&payload.shop_domain)?;
    Ok(Json(ApiResponse::success(response)))
}

/// Completes the OAuth round trip and redirects back to the dashboard.
///
/// Every outcome is a redirect: missing parameters and exchange failures
/// carry a generic error code, success carries the connected shop id. The
/// underlying cause is never exposed in the redirect.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let app_url = state.config.shopify.app_url.trim_end_matches('/').to_string();

    let (code, shop) = match (params.code, params.shop) {
        (Some(code), Some(shop)) if !code.is_empty() && !shop.is_empty() => (code, shop),
        _ => return Redirect::to(&format!("{}/?error=missing_params", app_url)),
    };

    match state
        .oauth
        .handle_callback(&code, &shop, params.state.as_deref().unwrap_or(""))
        .await
    {
        Ok(shop_id) => Redirect::to(&format!("{}/?connected={}", app_url, shop_id)),
        Err(_) => Redirect::to(&format!("{}/?error=oauth_failed", app_url)),
    }
}

/// Returns the rolling 30-day metrics summary for a connected shop
async fn shop_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<MetricsSummary>>> {
    let shop_id = uuid::Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("Invalid shop ID format".to_string()))?;
    let summary = state.metrics.summarize(shop_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Lists recent audit events for a connected shop
async fn shop_audit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<AuditEvent>>>> {
    let shop_id = uuid::Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("Invalid shop ID format".to_string()))?;
    let events = state.database.list_audit_events(shop_id, 50).await?;
    Ok(Json(ApiResponse::success(events)))
}

/// Records a disconnect for a shop while preserving its history
async fn disconnect_shop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let shop_id = uuid::Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("Invalid shop ID format".to_string()))?;
    state.metrics.disconnect(shop_id).await?;
    Ok(Json(ApiResponse::success(())))
}
