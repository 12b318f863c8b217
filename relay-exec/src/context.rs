//! Request-scoped correlation identifiers.
//!
//! The inbound HTTP layer runs each request inside [`RequestContext::scope`];
//! every outbound call made while handling that request picks the identifiers
//! up from task-local storage. Tokio task-locals are not inherited by spawned
//! tasks, so work moved onto a new task must be wrapped in `scope` again.

use std::future::Future;

use tokio::task_local;

use crate::descriptor::RequestDescriptor;

/// Header carrying the trace identifier.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Correlation identifiers of the request being handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Trace identifier
    pub trace_id: String,
    /// Request identifier
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Create a context.
    pub fn new(trace_id: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            request_id,
        }
    }

    /// Context of the current task, if one is in scope.
    pub fn current() -> Option<Self> {
        REQUEST_CONTEXT.try_with(Clone::clone).ok()
    }

    /// Run `fut` with this context in scope.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        REQUEST_CONTEXT.scope(self, fut).await
    }

    /// Copy identifiers onto the descriptor without overriding caller headers.
    pub fn inject(&self, descriptor: &mut RequestDescriptor) {
        descriptor.set_header_if_absent(TRACE_ID_HEADER, &self.trace_id);
        if let Some(request_id) = &self.request_id {
            descriptor.set_header_if_absent(REQUEST_ID_HEADER, request_id);
        }
    }
}

/// Inject the ambient context, if any. Nothing is fabricated when absent.
pub fn inject_current(descriptor: &mut RequestDescriptor) {
    if let Some(context) = RequestContext::current() {
        context.inject(descriptor);
    }
}
