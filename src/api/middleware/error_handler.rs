//! Error handler for converting AppError to HTTP responses.
//!
//! `AppError` renders itself as an `ErrorResponse` body and stashes a copy
//! in the response extensions; `global_error_handler` then stamps the
//! request ID onto it and converts any remaining plain-text error responses
//! (axum rejections, unmatched routes) into the same JSON shape.

use axum::{
    Json,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use super::RequestId;
use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation { .. }
            | AppError::ValidationErrors { .. }
            | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::UnprocessableContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::Database { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ConnectionPool { .. } | AppError::Unavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Validation { .. } | AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
            AppError::BadRequest { .. } => "BAD_REQUEST",
            AppError::UnprocessableContent { .. } => "UNPROCESSABLE_CONTENT",
            AppError::Unauthorized { .. } => "UNAUTHORIZED",
            AppError::Forbidden { .. } => "FORBIDDEN",
            AppError::Database { .. } => "DATABASE_ERROR",
            AppError::ConnectionPool { .. } | AppError::Unavailable { .. } => {
                "SERVICE_UNAVAILABLE"
            }
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Client-facing body. Sources of server-side failures are not exposed.
    pub fn to_error_response(&self) -> ErrorResponse {
        let code = self.error_code();
        match self {
            AppError::NotFound {
                entity,
                field,
                value,
            } => ErrorResponse::not_found_error(entity, field, value),
            AppError::Validation { field, reason } => ErrorResponse::validation_error(field, reason),
            AppError::ValidationErrors { errors } => {
                ErrorResponse::new(code, "Request validation failed")
                    .with_details(json!({ "errors": errors }))
            }
            AppError::BadRequest { message }
            | AppError::UnprocessableContent { message }
            | AppError::Unauthorized { message }
            | AppError::Forbidden { message }
            | AppError::Unavailable { message } => ErrorResponse::new(code, message),
            AppError::Database { operation, .. } => ErrorResponse::new(
                code,
                &format!("Database operation failed: {}", operation),
            )
            .with_details(json!({ "operation": operation })),
            AppError::ConnectionPool { .. } => {
                ErrorResponse::new(code, "Database connection unavailable")
            }
            AppError::Internal { .. } => ErrorResponse::new(code, "An internal error occurred"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, code = self.error_code(), "Request failed");
        }

        let body = self.to_error_response();
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

/// Global error handling middleware.
///
/// Attaches the request ID to `AppError` bodies and rewrites any other
/// non-JSON 4xx/5xx response into the standard `ErrorResponse` format.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().map(|id| id.0.clone());
    let response = next.run(request).await;
    let status = response.status();

    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    if let Some(body) = response.extensions().get::<ErrorResponse>().cloned() {
        return match request_id {
            Some(request_id) => rebuild(response, body.with_request_id(&request_id)),
            None => response,
        };
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    if is_json {
        return response;
    }

    let (parts, body) = response.into_parts();
    let original_message = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };

    let mut error_response = fallback_error(status, original_message);
    if let Some(request_id) = &request_id {
        error_response = error_response.with_request_id(request_id);
    }

    let mut rebuilt = (status, Json(error_response)).into_response();
    if let Some(value) = parts.headers.get(header::ALLOW) {
        rebuilt.headers_mut().insert(header::ALLOW, value.clone());
    }
    rebuilt
}

fn rebuild(response: Response, body: ErrorResponse) -> Response {
    let (parts, _) = response.into_parts();
    let mut rebuilt = (parts.status, Json(body.clone())).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
            rebuilt.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rebuilt.extensions_mut().insert(body);
    rebuilt
}

fn fallback_error(status: StatusCode, original_message: String) -> ErrorResponse {
    let (code, default_message) = match status {
        StatusCode::BAD_REQUEST => ("BAD_REQUEST", "Bad request - invalid or malformed request"),
        StatusCode::NOT_FOUND => ("NOT_FOUND", "The requested resource was not found"),
        StatusCode::METHOD_NOT_ALLOWED => {
            ("METHOD_NOT_ALLOWED", "HTTP method not allowed for this endpoint")
        }
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ("UNSUPPORTED_MEDIA_TYPE", "Unsupported media type"),
        StatusCode::REQUEST_TIMEOUT => ("REQUEST_TIMEOUT", "Request timeout"),
        StatusCode::PAYLOAD_TOO_LARGE => ("PAYLOAD_TOO_LARGE", "Request payload too large"),
        StatusCode::SERVICE_UNAVAILABLE => {
            ("SERVICE_UNAVAILABLE", "Service temporarily unavailable")
        }
        status if status.is_server_error() => {
            ("INTERNAL_SERVER_ERROR", "An internal server error occurred")
        }
        _ => ("UNKNOWN_ERROR", "An unknown error occurred"),
    };

    // Server-side text can carry internals
    let message = if original_message.is_empty() || status.is_server_error() {
        default_message.to_string()
    } else {
        original_message
    };
    ErrorResponse::new(code, &message)
}
