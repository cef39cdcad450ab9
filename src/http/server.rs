//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router serving the module protocol
//! - Wire up middleware (tracing, timeout, concurrency limit, request ID)
//! - Parse paths and hand requests to the dispatcher
//! - Serve until the shutdown signal, then drain

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::dispatch::Dispatcher;
use crate::http::context::ContextPool;
use crate::http::request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
use crate::module::{ParsedRequest, PathError, RequestKind};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub contexts: Arc<ContextPool>,
}

/// HTTP server for the module proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server around an assembled dispatcher.
    pub fn new(config: ProxyConfig, dispatcher: Dispatcher) -> Self {
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            contexts: Arc::new(ContextPool::new(config.pool.max_idle_contexts)),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", get(module_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// The router, for serving through another listener or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Serves one protocol resource.
async fn module_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut ctx = state.contexts.acquire();
    let started = Instant::now();
    ctx.started = Some(started);
    ctx.request_id = headers.request_id().map(str::to_owned);
    ctx.path.push_str(&path);

    let parsed = match ParsedRequest::parse(&ctx.path) {
        Ok(parsed) => parsed,
        Err(PathError::UnknownKind) => {
            tracing::debug!(path = %ctx.path, "Not a module request");
            metrics::record_request(RequestKind::Unknown, 404, started);
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(e) => {
            tracing::debug!(path = %ctx.path, error = %e, "Malformed module path");
            metrics::record_request(RequestKind::Unknown, 400, started);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    let kind = parsed.kind();
    let request = ctx.request.insert(parsed);

    let response = match state.dispatcher.dispatch(request).await {
        Ok(fetched) => {
            ctx.source = Some(fetched.source);
            fetched.into_response()
        }
        Err(e) => {
            ctx.source = Some(e.source);
            e.into_response()
        }
    };

    tracing::debug!(
        request_id = ctx.request_id.as_deref().unwrap_or("unknown"),
        module = ?ctx.request.as_ref().map(|r| r.module().to_string()),
        kind = %kind,
        source = ?ctx.source,
        status = response.status().as_u16(),
        "Request handled"
    );
    metrics::record_request(kind, response.status().as_u16(), started);
    response
}
