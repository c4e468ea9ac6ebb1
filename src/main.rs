use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tiered_rpc::{
    AppState,
    auth::{JwtSessionResolver, SessionState},
    config::{AppConfig, NodeEnv},
    create_router,
    procedure::RpcConfig,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    transformer::Transformer,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, connects the user store and serves
/// the HTTP application.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail fast on missing production settings).
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging. RUST_LOG wins; otherwise a verbose default for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tiered_rpc=debug,tower_http=info".into());

    match config.node_env {
        NodeEnv::Development | NodeEnv::Test => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        NodeEnv::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.node_env);

    // 3. User store.
    let repo: RepositoryState = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory user store");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Sessions and wire settings.
    let sessions: SessionState = Arc::new(JwtSessionResolver::new(repo.clone(), &config));
    let rpc = RpcConfig::new(Transformer::Envelope);

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        sessions,
        config,
        rpc,
    });

    // 5. Serve.
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("RPC endpoint available at /api/trpc");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated");
}
