//! HTTP API for the relay daemon.
//!
//! Provides REST endpoints for:
//! - Liveness and readiness checks
//! - Purchase ingestion (`POST /api/v1/purchases`)

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, warn};

use relay_domain::{AppError, ErrorKind};
use relay_exec::{REQUEST_ID_HEADER, TRACE_ID_HEADER};

use crate::config::RequestLogging;
use crate::context::AppContext;
use crate::dto::{parse_create_purchase, CreatePurchaseResponse, Issue};
use crate::signature::{verify, SIGNATURE_HEADER};
use crate::trace::{trace_context, TraceIds};

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

/// Error body for `AppError`s.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: ErrorKind,
    pub message: String,
    /// Omitted entirely for masked server errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub request_id: String,
}

/// Error body for request shape violations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub code: ErrorKind,
    pub message: &'static str,
    pub issues: Vec<Issue>,
    pub request_id: String,
}

// =============================================================================
// Errors
// =============================================================================

/// Handler failure, rendered according to the masking policy.
#[derive(Debug)]
pub enum ApiError {
    /// Body failed shape validation
    Invalid { issues: Vec<Issue>, request_id: String },
    /// Application error
    App {
        error: AppError,
        mask: bool,
        request_id: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid { issues, request_id } => {
                debug!(issues = issues.len(), "Request validation failed");
                let body = ValidationResponse {
                    code: ErrorKind::Validation,
                    message: "Request validation failed",
                    issues,
                    request_id,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            },
            ApiError::App {
                error,
                mask,
                request_id,
            } => render_app_error(&error, mask, request_id),
        }
    }
}

fn render_app_error(err: &AppError, mask: bool, request_id: String) -> Response {
    let cause = err.cause().map(|c| c.to_string());
    if err.is_server_error() {
        error!(code = %err.kind(), status = err.status_code(), cause = ?cause, "{}", err.message());
    } else {
        warn!(code = %err.kind(), status = err.status_code(), cause = ?cause, "{}", err.message());
    }

    let masked = mask && err.is_server_error();
    let visible = if masked { err.without_details() } else { err.clone() };
    let details = match visible.details() {
        Some(details) => Some(details.clone()),
        None if masked => None,
        None => Some(Value::Null),
    };
    let body = ErrorResponse {
        code: err.kind(),
        message: if masked {
            "Internal server error".to_string()
        } else {
            err.message().to_string()
        },
        details,
        request_id,
    };

    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router with middleware applied.
pub fn create_router(context: Arc<AppContext>) -> Router {
    let cors = cors_layer(&context.config.security.allowed_origins);
    let request_logging = context.config.observability.request_logging;

    let mut router = Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/api/v1/purchases", post(create_purchase_handler))
        .with_state(context)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    if request_logging == RequestLogging::Standard {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.layer(middleware::from_fn(trace_context))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(REQUEST_ID_HEADER),
                HeaderName::from_static(TRACE_ID_HEADER),
                HeaderName::from_static(SIGNATURE_HEADER),
            ])
            .expose_headers([
                HeaderName::from_static(REQUEST_ID_HEADER),
                HeaderName::from_static(TRACE_ID_HEADER),
            ]),
    )
}

// =============================================================================
// Handlers
// =============================================================================

async fn liveness_handler(State(context): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: context.config.service_name.clone(),
    })
}

async fn readiness_handler(State(context): State<Arc<AppContext>>) -> Json<HealthResponse> {
    debug!("Readiness check invoked");
    Json(HealthResponse {
        status: "ready",
        service: context.config.service_name.clone(),
    })
}

async fn create_purchase_handler(
    State(context): State<Arc<AppContext>>,
    Extension(ids): Extension<TraceIds>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatePurchaseResponse>), ApiError> {
    let app_error = |error: AppError| ApiError::App {
        error,
        mask: context.config.security.mask_error_details,
        request_id: ids.request_id.clone(),
    };

    if let Some(secret) = context.config.security.webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !verify(secret, &body, signature) {
            return Err(app_error(AppError::new(
                ErrorKind::Validation,
                401,
                "Invalid request signature",
            )));
        }
    }

    let input = parse_create_purchase(&body).map_err(|issues| ApiError::Invalid {
        issues,
        request_id: ids.request_id.clone(),
    })?;

    let outcome = context.workflow.execute(input).await.map_err(app_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreatePurchaseResponse {
            status: outcome.status,
            trace_id: ids.trace_id.clone(),
            request_id: ids.request_id.clone(),
        }),
    ))
}
