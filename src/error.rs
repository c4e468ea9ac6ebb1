use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::validation::ValidationError;

/// ErrorCode
///
/// The procedure-level error taxonomy. Each code maps to a JSON-RPC 2.0 error
/// number (sent as `error.code`) and an HTTP status (used for the response
/// status and reported as `data.httpStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    ParseError,
    BadRequest,
    InternalServerError,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotSupported,
    Timeout,
    Conflict,
    PreconditionFailed,
    PayloadTooLarge,
    TooManyRequests,
    ClientClosedRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::ClientClosedRequest => "CLIENT_CLOSED_REQUEST",
        }
    }

    /// JSON-RPC error number. The standard range covers parse/request/internal
    /// failures; the application codes live in the -32000..-32099 server range.
    pub fn json_rpc_code(&self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::BadRequest => -32600,
            ErrorCode::InternalServerError => -32603,
            ErrorCode::Unauthorized => -32001,
            ErrorCode::Forbidden => -32003,
            ErrorCode::NotFound => -32004,
            ErrorCode::MethodNotSupported => -32005,
            ErrorCode::Timeout => -32008,
            ErrorCode::Conflict => -32009,
            ErrorCode::PreconditionFailed => -32012,
            ErrorCode::PayloadTooLarge => -32013,
            ErrorCode::TooManyRequests => -32029,
            ErrorCode::ClientClosedRequest => -32099,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ParseError | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotSupported => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            // 499 is nginx's "client closed request"; not a registered constant.
            ErrorCode::ClientClosedRequest => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RpcError
///
/// The single error type a guard or procedure handler can fail with. The code
/// and message travel to the client unchanged; `cause` is only inspected by the
/// error formatter (validation failures get a readable rewrite).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub cause: Option<ValidationError>,
}

impl RpcError {
    /// An error whose message is the code name, e.g. `UNAUTHORIZED`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.as_str().to_string(),
            cause: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalServerError, message)
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self.code {
            ErrorCode::BadRequest => self.cause.as_ref(),
            _ => None,
        }
    }
}

impl From<ValidationError> for RpcError {
    /// Input validation failures are `BAD_REQUEST`; the raw message is the issue list.
    fn from(err: ValidationError) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            message: err.to_string(),
            cause: Some(err),
        }
    }
}

/// ErrorShape
///
/// The error payload sent to clients: the JSON-RPC style base shape plus the
/// `data` block. Exported to TypeScript so the client can type its error handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ErrorShape {
    pub message: String,
    pub code: i32,
    pub data: ErrorData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ErrorData {
    pub code: ErrorCode,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub path: Option<String>,
    /// Readable validation message for input validation failures, otherwise
    /// the raw error message. The wire name is kept for existing clients.
    #[serde(rename = "zodError")]
    pub validation_error: String,
}

/// format_error
///
/// Builds the outgoing shape for an error raised on `path`. The code is never
/// altered; only `data.zodError` differs between validation and other failures.
pub fn format_error(error: &RpcError, path: Option<&str>) -> ErrorShape {
    let validation_error = match error.validation_error() {
        Some(cause) => cause.readable(),
        None => error.message.clone(),
    };

    ErrorShape {
        message: error.message.clone(),
        code: error.code.json_rpc_code(),
        data: ErrorData {
            code: error.code,
            http_status: error.code.http_status().as_u16(),
            path: path.map(str::to_string),
            validation_error,
        },
    }
}
