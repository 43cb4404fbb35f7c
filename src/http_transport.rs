//! HTTP transport for the REC API
//!
//! Routes:
//! - `GET /health`
//! - `GET|POST /api/spaces`, `/api/buildings`, `/api/sensors`
//! - `GET|POST /api/observations`
//! - `POST /api/cloudevents`

pub mod cloudevents;
pub mod handlers;
pub mod hydra;

use crate::error::{RecError, Result};
use crate::services::RecService;
use crate::storage::entities::{BUILDING_TYPE, SENSOR_TYPE, SPACE_TYPE};
use axum::{
    extract::{RawQuery, State},
    http::Uri,
    routing::{get, post, MethodRouter},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub port: u16,
    /// Path used in generated page links instead of the request path
    pub api_path: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_path: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: RecService,
    pub api_path: Option<String>,
}

impl AppState {
    pub fn new(service: RecService, api_path: Option<String>) -> Self {
        Self { service, api_path }
    }

    /// Path that page links point at
    pub fn link_base<'a>(&'a self, uri: &'a Uri) -> &'a str {
        self.api_path.as_deref().unwrap_or_else(|| uri.path())
    }
}

fn entity_collection(entity_type: &'static str) -> MethodRouter<Arc<AppState>> {
    get(
        move |state: State<Arc<AppState>>, uri: Uri, query: RawQuery| {
            handlers::list_entities(state, uri, query, entity_type)
        },
    )
    .post(handlers::create_entity)
}

/// Build the router with all endpoints and middleware
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health_check));

    for (path, entity_type) in [
        ("/api/spaces", SPACE_TYPE),
        ("/api/buildings", BUILDING_TYPE),
        ("/api/sensors", SENSOR_TYPE),
    ] {
        router = router
            .route(path, entity_collection(entity_type))
            .route(&format!("{path}/"), entity_collection(entity_type));
    }

    router
        .route(
            "/api/observations",
            get(handlers::list_observations).post(handlers::create_observation),
        )
        .route(
            "/api/observations/",
            get(handlers::list_observations).post(handlers::create_observation),
        )
        .route("/api/cloudevents", post(handlers::handle_cloudevent))
        .route("/api/cloudevents/", post(handlers::handle_cloudevent))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct HttpTransportServer {
    state: Arc<AppState>,
    config: HttpServerConfig,
}

impl HttpTransportServer {
    pub fn new(service: RecService, config: HttpServerConfig) -> Self {
        let state = Arc::new(AppState::new(service, config.api_path.clone()));
        Self { state, config }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone(), self.config.request_timeout)
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.config.port))
            .await
            .map_err(|e| {
                RecError::config(format!("Failed to bind to port {}: {}", self.config.port, e))
            })?;

        info!("🌐 REC API listening on port {}", self.config.port);
        info!("🏥 Health check: http://localhost:{}/health", self.config.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RecError::internal(format!("HTTP server error: {e}")))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
