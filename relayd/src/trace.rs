//! Trace-context middleware.
//!
//! Every inbound request gets a request id (reused from `x-request-id` or a
//! fresh UUID v4) and a trace id (reused from `x-trace-id` or the request
//! id). Both are echoed on the response and bound to the task-local
//! `RequestContext`, so outbound upstream calls carry them too.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use relay_exec::{RequestContext, REQUEST_ID_HEADER, TRACE_ID_HEADER};

/// Correlation identifiers of the current request, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceIds {
    pub trace_id: String,
    pub request_id: String,
}

/// Axum middleware establishing the request context.
pub async fn trace_context(mut request: Request, next: Next) -> Response {
    let ids = resolve_ids(request.headers());
    request.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        trace_id = %ids.trace_id,
        request_id = %ids.request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let context = RequestContext::new(ids.trace_id.clone(), Some(ids.request_id.clone()));

    let mut response = context.scope(next.run(request)).instrument(span).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&ids.request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ids.trace_id) {
        headers.insert(TRACE_ID_HEADER, value);
    }
    response
}

fn resolve_ids(headers: &HeaderMap) -> TraceIds {
    let request_id =
        header_str(headers, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());
    let trace_id = header_str(headers, TRACE_ID_HEADER).unwrap_or_else(|| request_id.clone());

    TraceIds {
        trace_id,
        request_id,
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
