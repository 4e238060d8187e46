//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router feeding every request into the dispatcher
//! - Wire up middleware (request id, tracing)
//! - Consume configuration updates and swap them into the dispatcher
//! - Serve with graceful shutdown

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::discovery::ProviderRegistry;
use crate::http::dispatcher::Dispatcher;
use crate::http::request::RequestIdLayer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// The gateway's HTTP server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    /// Create a server with no registry-backed discovery providers.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_registry(config, Arc::new(ProviderRegistry::new()))
    }

    /// Create a server whose discovery-keyed routes resolve through the
    /// given provider registry.
    pub fn with_registry(config: GatewayConfig, registry: Arc<ProviderRegistry>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(&config, registry));
        let router = Self::build_router(dispatcher.clone(), config.listener.max_connections);
        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// The dispatcher backing this server.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers. In-flight requests
    /// beyond `max_connections` wait for a slot (backpressure).
    fn build_router(dispatcher: Arc<Dispatcher>, max_connections: usize) -> Router {
        let state = AppState { dispatcher };
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(GlobalConcurrencyLimitLayer::new(max_connections))
                    .layer(RequestIdLayer)
                    .layer(TraceLayer::new_for_http()),
            )
    }

    /// Run the server: serve requests, apply configuration updates, stop on
    /// the shutdown broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.route_table().len(),
            "Gateway starting"
        );

        let dispatcher = self.dispatcher.clone();
        let reload_loop = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                dispatcher.reload(&new_config);
            }
        });

        let app = self.router.into_make_service();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reload_loop.abort();
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Single entry point: every request goes through the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.dispatcher.dispatch(request).await {
        Ok(response) => response.into_response(),
        Err(error) => {
            tracing::warn!(error = %error, kind = error.kind(), "Dispatch failed");
            error.into_response()
        }
    }
}
