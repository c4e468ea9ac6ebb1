use axum::{Router, http::HeaderName, routing::get};

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Procedure machinery: context shapes, guards, tiers, routing, wire adapter.
pub mod adapter;
pub mod context;
pub mod error;
pub mod guards;
pub mod procedure;
pub mod router;
pub mod transformer;
pub mod validation;

// Application services.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;

// Procedure routers, one module per tier (public, protected, moderator, admin).
pub mod routes;

// --- Public Re-exports ---

pub use adapter::{RpcEndpoint, on_error_for};
pub use config::AppConfig;
pub use context::{AuthedContext, Context};
pub use error::{ErrorCode, RpcError};
pub use procedure::{
    RpcConfig, Tier, admin_procedure, moderator_procedure, protected_procedure, public_procedure,
};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use router::RpcRouter;

/// AppState
///
/// The services the HTTP stack is assembled from. Cloned into the RPC endpoint
/// once at router construction; nothing in it is mutated per request.
#[derive(Clone)]
pub struct AppState {
    /// User store backing sessions and the user procedures.
    pub repo: RepositoryState,
    /// Builds each request's `Context`.
    pub sessions: auth::SessionState,
    pub config: AppConfig,
    /// Wire settings shared by every procedure.
    pub rpc: RpcConfig,
}

/// create_router
///
/// Assembles the HTTP application: the RPC endpoint, a health check, and the
/// request-id / tracing / CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let endpoint = RpcEndpoint::new(
        routes::app_router(state.repo.clone()),
        state.rpc,
        state.sessions.clone(),
    )
    .with_on_error(on_error_for(state.config.node_env));

    let base_router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(adapter::rpc_routes(endpoint));

    // Observability and correlation layers wrap everything.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, correlated by the `x-request-id` header set above.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
