use std::env;

use thiserror::Error;

/// Development fallback for the session signing secret.
const DEV_JWT_SECRET: &str = "tiered-rpc-development-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// Holds the application's configuration, loaded once at startup and shared
/// read-only by the session resolver and the HTTP adapter.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the error logger, the log format
    // and the development login header.
    pub node_env: NodeEnv,
    // Postgres connection string. Without one the in-memory user store is used.
    pub database_url: Option<String>,
    // HS256 secret used to verify session tokens.
    pub jwt_secret: String,
    pub bind_addr: String,
}

/// NodeEnv
///
/// Value of `NODE_ENV`. Only `development` switches development behaviour on;
/// unknown or missing values are treated as production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeEnv {
    Development,
    Test,
    Production,
}

impl NodeEnv {
    pub fn parse(value: &str) -> Self {
        match value {
            "development" => NodeEnv::Development,
            "test" => NodeEnv::Test,
            _ => NodeEnv::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        *self == NodeEnv::Development
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when NODE_ENV=production")]
    MissingInProduction(&'static str),
}

impl Default for AppConfig {
    /// Test-friendly configuration: development mode, in-memory store, fallback secret.
    fn default() -> Self {
        Self {
            node_env: NodeEnv::Development,
            database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment. Production refuses to start
    /// without a database and a real signing secret.
    pub fn load() -> Result<Self, ConfigError> {
        let node_env = env::var("NODE_ENV")
            .map(|v| NodeEnv::parse(&v))
            .unwrap_or(NodeEnv::Production);

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt_secret = env::var("SESSION_JWT_SECRET").ok().filter(|v| !v.is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match node_env {
            NodeEnv::Production => Ok(Self {
                node_env,
                database_url: Some(
                    database_url.ok_or(ConfigError::MissingInProduction("DATABASE_URL"))?,
                ),
                jwt_secret: jwt_secret
                    .ok_or(ConfigError::MissingInProduction("SESSION_JWT_SECRET"))?,
                bind_addr,
            }),
            NodeEnv::Development | NodeEnv::Test => Ok(Self {
                node_env,
                database_url,
                jwt_secret: jwt_secret.unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
                bind_addr,
            }),
        }
    }
}
