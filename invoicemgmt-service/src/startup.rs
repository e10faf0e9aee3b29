//! Application startup and lifecycle management.

use crate::config::InvoiceMgmtConfig;
use crate::services::{
    get_metrics, init_metrics, BulkIssueOrchestrator, ConfigFeatureToggle, Database,
    InvoiceLifecycleEngine, RequestContext, ResolvedFeatures,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use service_core::error::AppError;
use service_core::grpc::BillItemClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub type Engine = InvoiceLifecycleEngine<Database, BillItemClient>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: InvoiceMgmtConfig,
    pub db: Arc<Database>,
    pub engine: Arc<Engine>,
    pub bulk_issue: Arc<BulkIssueOrchestrator<Database>>,
    pub features: Arc<ConfigFeatureToggle>,
}

impl AppState {
    /// Resolve feature flags once and build the context for one request.
    pub async fn request_context(
        &self,
        tenant_id: Uuid,
        user_id: &str,
    ) -> Result<RequestContext, AppError> {
        let features = ResolvedFeatures::resolve(self.features.as_ref()).await?;
        Ok(RequestContext::new(tenant_id, user_id, features))
    }
}

/// State for health check endpoints.
#[derive(Clone)]
struct HealthState {
    db: Arc<Database>,
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "invoicemgmt-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "invoicemgmt-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: InvoiceMgmtConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: InvoiceMgmtConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: InvoiceMgmtConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let db = Arc::new(db);

        let bill_items = BillItemClient::new(config.bill_item_service.client_config())
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Invalid bill item service endpoint {}: {}",
                    config.bill_item_service.endpoint,
                    e
                ))
            })?;

        let engine = Arc::new(InvoiceLifecycleEngine::new(
            db.clone(),
            Arc::new(bill_items),
            config.retry.adjustment(),
        ));
        let bulk_issue = Arc::new(BulkIssueOrchestrator::new(
            db.clone(),
            config.retry.bulk_issue(),
        ));
        let features = Arc::new(ConfigFeatureToggle::new(config.features.iter().cloned()));

        let state = AppState {
            config: config.clone(),
            db,
            engine,
            bulk_issue,
            features,
        };

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Invoice management listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let health_state = HealthState {
            db: self.state.db.clone(),
        };

        let http_router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(health_state);

        tracing::info!(
            service = "invoicemgmt-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, http_router)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "HTTP server error");
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
