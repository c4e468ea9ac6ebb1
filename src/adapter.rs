//! HTTP adapter.
//!
//! Exposes an [`RpcRouter`] on a single axum route. Queries arrive as
//! `GET /api/trpc/<path>?input=<json>`, mutations as `POST /api/trpc/<path>`
//! with a JSON body. With `?batch=1` the path is a comma separated list and the
//! input an object keyed by call index; the response is then an array in call
//! order.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    auth::{SessionState, create_context},
    config::NodeEnv,
    context::Context,
    error::{ErrorCode, RpcError},
    procedure::{ProcedureKind, RpcConfig},
    router::RpcRouter,
};

pub const RPC_ROUTE: &str = "/api/trpc/{*path}";

/// What the `on_error` hook is told about a failed call.
#[derive(Debug)]
pub struct ErrorEvent<'a> {
    pub path: &'a str,
    pub kind: ProcedureKind,
    pub error: &'a RpcError,
}

pub type OnError = Arc<dyn Fn(&ErrorEvent<'_>) + Send + Sync>;

/// development_logger
///
/// Emits one `error` event per failed call, naming the procedure path.
pub fn development_logger() -> OnError {
    Arc::new(|event: &ErrorEvent<'_>| {
        tracing::error!(
            path = event.path,
            kind = event.kind.as_str(),
            code = event.error.code.as_str(),
            "procedure failed on {}: {}",
            event.path,
            event.error
        );
    })
}

/// The error hook for an environment: the development logger, or nothing.
pub fn on_error_for(node_env: NodeEnv) -> Option<OnError> {
    node_env.is_development().then(development_logger)
}

/// RpcEndpoint
///
/// Everything the adapter needs per request: the procedures, the wire
/// configuration, the session resolver and the optional error hook.
#[derive(Clone)]
pub struct RpcEndpoint {
    router: Arc<RpcRouter>,
    config: RpcConfig,
    sessions: SessionState,
    on_error: Option<OnError>,
}

impl RpcEndpoint {
    pub fn new(router: RpcRouter, config: RpcConfig, sessions: SessionState) -> Self {
        Self {
            router: Arc::new(router),
            config,
            sessions,
            on_error: None,
        }
    }

    pub fn with_on_error(mut self, on_error: Option<OnError>) -> Self {
        self.on_error = on_error;
        self
    }

    /// dispatch
    ///
    /// Resolves the context once, runs every call (concurrently for batches)
    /// and frames the results. Nothing is written until all calls finished.
    pub async fn dispatch(
        &self,
        kind: ProcedureKind,
        path: &str,
        batch: bool,
        raw_input: Result<Option<Value>, RpcError>,
        headers: &HeaderMap,
    ) -> Response {
        let paths: Vec<&str> = if batch {
            path.split(',').collect()
        } else {
            vec![path]
        };

        let outcomes = match self.prepare(batch, paths.len(), raw_input, headers).await {
            Ok((ctx, inputs)) => {
                let calls = paths.iter().zip(inputs).map(|(path, input)| {
                    let ctx = ctx.clone();
                    async move { self.router.call(kind, path, ctx, input?).await }
                });
                join_all(calls).await
            }
            Err(err) => paths.iter().map(|_| Err(err.clone())).collect(),
        };

        let (statuses, items): (Vec<StatusCode>, Vec<Value>) = paths
            .iter()
            .zip(outcomes)
            .map(|(path, outcome)| self.frame(kind, path, outcome))
            .unzip();

        let status = response_status(&statuses);
        let body = if batch {
            Value::Array(items)
        } else {
            items.into_iter().next().unwrap_or(Value::Null)
        };

        (status, Json(body)).into_response()
    }

    async fn prepare(
        &self,
        batch: bool,
        count: usize,
        raw_input: Result<Option<Value>, RpcError>,
        headers: &HeaderMap,
    ) -> Result<(Context, Vec<Result<Value, RpcError>>), RpcError> {
        let raw = raw_input?.unwrap_or(Value::Null);
        let inputs = if batch {
            split_batch_input(raw, count)?
        } else {
            vec![raw]
        };
        let inputs = inputs
            .into_iter()
            .map(|input| self.config.transformer.deserialize(input))
            .collect();

        let ctx = create_context(self.sessions.as_ref(), headers).await?;
        Ok((ctx, inputs))
    }

    fn frame(
        &self,
        kind: ProcedureKind,
        path: &str,
        outcome: Result<Value, RpcError>,
    ) -> (StatusCode, Value) {
        let transformer = self.config.transformer;
        match outcome {
            Ok(data) => (
                StatusCode::OK,
                json!({ "result": { "data": transformer.serialize(data) } }),
            ),
            Err(error) => {
                if let Some(on_error) = &self.on_error {
                    on_error(&ErrorEvent {
                        path,
                        kind,
                        error: &error,
                    });
                }
                let shape = self.config.format_error(&error, Some(path));
                let shape = serde_json::to_value(&shape)
                    .unwrap_or_else(|_| json!({ "message": error.message }));
                (
                    error.code.http_status(),
                    json!({ "error": transformer.serialize(shape) }),
                )
            }
        }
    }
}

/// Query string of an RPC request.
#[derive(Debug, Default, Deserialize)]
pub struct RpcQuery {
    pub batch: Option<String>,
    pub input: Option<String>,
}

impl RpcQuery {
    fn is_batch(&self) -> bool {
        matches!(self.batch.as_deref(), Some("1") | Some("true"))
    }
}

/// rpc_routes
///
/// The single RPC route, with the endpoint as its state.
pub fn rpc_routes(endpoint: RpcEndpoint) -> Router {
    Router::new()
        .route(RPC_ROUTE, get(handle_query).post(handle_mutation))
        .with_state(Arc::new(endpoint))
}

async fn handle_query(
    State(endpoint): State<Arc<RpcEndpoint>>,
    Path(path): Path<String>,
    Query(query): Query<RpcQuery>,
    headers: HeaderMap,
) -> Response {
    let raw_input = query.input.as_deref().map(parse_json).transpose();
    endpoint
        .dispatch(ProcedureKind::Query, &path, query.is_batch(), raw_input, &headers)
        .await
}

async fn handle_mutation(
    State(endpoint): State<Arc<RpcEndpoint>>,
    Path(path): Path<String>,
    Query(query): Query<RpcQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw_input = if body.is_empty() {
        Ok(None)
    } else {
        serde_json::from_slice::<Value>(&body)
            .map(Some)
            .map_err(parse_error)
    };
    endpoint
        .dispatch(ProcedureKind::Mutation, &path, query.is_batch(), raw_input, &headers)
        .await
}

fn parse_json(raw: &str) -> Result<Value, RpcError> {
    serde_json::from_str(raw).map_err(parse_error)
}

fn parse_error(err: serde_json::Error) -> RpcError {
    RpcError::with_message(
        ErrorCode::ParseError,
        format!("Unable to parse input: {}", err),
    )
}

fn split_batch_input(raw: Value, count: usize) -> Result<Vec<Value>, RpcError> {
    match raw {
        Value::Null => Ok(vec![Value::Null; count]),
        Value::Object(mut map) => Ok((0..count)
            .map(|index| map.remove(&index.to_string()).unwrap_or(Value::Null))
            .collect()),
        _ => Err(RpcError::bad_request(
            "Batch input must be an object keyed by call index",
        )),
    }
}

/// One status for the whole response: the shared status when every call
/// agrees, 207 otherwise.
fn response_status(statuses: &[StatusCode]) -> StatusCode {
    match statuses.split_first() {
        Some((first, rest)) if rest.iter().all(|status| status == first) => *first,
        Some(_) => StatusCode::MULTI_STATUS,
        None => StatusCode::OK,
    }
}
