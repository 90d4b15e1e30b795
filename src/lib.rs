//! Storefront API library
//!
//! Checkout finalization driven by payment-provider webhooks: idempotent
//! order creation, promotion-code reconciliation, shipping-selection
//! validation and order notifications.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod payments;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::notifications::{Mailer, NotificationDispatcher};
use crate::payments::PaymentProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
    pub started_at: Instant,
}

impl AppState {
    /// Wires services around the given collaborators and starts the
    /// notification workers. The returned handle resolves once every clone of
    /// the state has been dropped and queued emails are flushed.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: Arc<config::AppConfig>,
        provider: Arc<dyn PaymentProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> (Self, JoinHandle<()>) {
        let (notifications, workers) = NotificationDispatcher::spawn(mailer, &config);
        let services = handlers::AppServices::new(db.clone(), config.clone(), provider, notifications);
        let state = Self {
            db,
            config,
            services,
            started_at: Instant::now(),
        };
        (state, workers)
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_secs: u64,
    pub version: String,
    pub timestamp: String,
}

pub fn api_v1_routes() -> Router<AppState> {
    // Payment webhook (does not require auth, but signature-verified)
    let payment_webhook = Router::new().route(
        "/payments/webhook",
        axum::routing::post(handlers::payment_webhooks::payment_webhook),
    );

    Router::new()
        .merge(payment_webhook)
        .merge(handlers::shipping::shipping_routes())
        .merge(handlers::orders::order_routes())
}

/// Full application router with HTTP tracing and request ids
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "unhealthy"
        }
    };

    Json(HealthResponse {
        status: if database == "healthy" { "healthy" } else { "degraded" }.to_string(),
        database: database.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
