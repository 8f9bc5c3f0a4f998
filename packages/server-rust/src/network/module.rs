//! HTTP server lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the listener, and
//! `serve()` accepts requests until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, readiness_handler, validate_csv_handler, AppState,
};
use super::middleware::{build_http_layers, probe_timeout_layer};
use super::shutdown::ShutdownController;
use crate::service::ValidationOrchestrator;

/// How long shutdown waits for running validations.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Assembles the router with every route and the HTTP middleware.
///
/// Routes:
/// - `POST /validate_csv` -- validate a server-local CSV file
/// - `GET /health` -- detailed health JSON
/// - `GET /health/live` -- liveness probe
/// - `GET /health/ready` -- readiness probe
///
/// `/validate_csv` has no deadline; its body size is capped at
/// `max_body_bytes`.
pub fn router(state: AppState, config: &NetworkConfig) -> Router {
    let probes = Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(probe_timeout_layer(config));

    Router::new()
        .route("/validate_csv", post(validate_csv_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .merge(probes)
        .layer(build_http_layers(config))
        .with_state(state)
}

/// Owns the listener and the state shared with handlers.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    orchestrator: Arc<ValidationOrchestrator>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, orchestrator: Arc<ValidationOrchestrator>) -> Self {
        Self {
            config,
            listener: None,
            orchestrator,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Builds the router over this module's shared state.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            orchestrator: Arc::clone(&self.orchestrator),
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
        };
        router(state, &self.config)
    }

    /// Binds the listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("listening on {}:{}", self.config.host, port);
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// After the signal the state moves to Draining, running validations get
    /// up to 30 seconds to finish, and the state moves to Stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let controller = self.shutdown;

        controller.set_ready();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        drain(&controller).await;
        Ok(())
    }
}

async fn drain(controller: &ShutdownController) {
    controller.trigger_shutdown();
    let running = controller.in_flight_count();
    if running > 0 {
        info!(running, "waiting for running validations");
    }
    if controller.wait_for_drain(DRAIN_TIMEOUT).await {
        info!("shutdown complete");
    } else {
        warn!("drain timeout expired with validations still running");
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use csvcheck_core::claims;
    use tower::ServiceExt;

    use super::*;
    use crate::network::HealthState;
    use crate::service::ValidationConfig;

    fn module(port: u16) -> NetworkModule {
        let schema = claims::claims_schema().unwrap();
        let profile = claims::claims_profile(&schema);
        let orchestrator = ValidationOrchestrator::new(
            Arc::new(schema),
            Arc::new(profile),
            ValidationConfig::default(),
        );
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..NetworkConfig::default()
        };
        NetworkModule::new(config, Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module(0);
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module(0).serve(std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = module(0)
            .build_router()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = module(0)
            .build_router()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn serve_stops_on_signal() {
        let mut module = module(0);
        module.start().await.unwrap();
        let controller = module.shutdown_controller();

        module.serve(async {}).await.unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
