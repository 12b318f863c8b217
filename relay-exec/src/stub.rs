//! Stub transport for testing.
//!
//! Answers from a script of outcomes and records every request it sees, so
//! tests can assert on retry counts, timing and injected headers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::descriptor::RequestDescriptor;
use crate::ports::{Transport, TransportFailure, UpstreamResponse};

type Outcome = Result<UpstreamResponse, TransportFailure>;

/// Request seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Descriptor as dispatched
    pub descriptor: RequestDescriptor,
    /// When it was dispatched
    pub at: Instant,
}

#[derive(Default)]
struct StubState {
    script: VecDeque<Outcome>,
    fallback: Option<Outcome>,
    delay: Duration,
    requests: Vec<RecordedRequest>,
}

/// Scripted transport.
///
/// Clones share state: hand one clone to an executor and keep another to
/// inspect recorded requests. Scripted outcomes are consumed in order; once
/// exhausted the fallback answers (200 with an empty body by default).
#[derive(Clone, Default)]
pub struct StubTransport {
    state: Arc<Mutex<StubState>>,
}

impl StubTransport {
    /// Stub answering 200 with an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub answering every request with 200 and `body`.
    pub fn always_ok(body: Option<Value>) -> Self {
        let stub = Self::new();
        stub.set_fallback(Ok(UpstreamResponse::ok(body)));
        stub
    }

    /// Stub answering every request with `status`.
    pub fn always_status(status: u16) -> Self {
        let stub = Self::new();
        stub.set_fallback(Err(TransportFailure::Status { status, body: None }));
        stub
    }

    /// Queue a 200 response.
    pub fn push_ok(&self, body: Option<Value>) -> &Self {
        self.push(Ok(UpstreamResponse::ok(body)))
    }

    /// Queue a non-2xx response.
    pub fn push_status(&self, status: u16) -> &Self {
        self.push(Err(TransportFailure::Status { status, body: None }))
    }

    /// Queue an arbitrary failure.
    pub fn push_failure(&self, failure: TransportFailure) -> &Self {
        self.push(Err(failure))
    }

    /// Replace the answer used once the script runs out.
    pub fn set_fallback(&self, outcome: Outcome) {
        self.lock().fallback = Some(outcome);
    }

    /// Delay every answer by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Most recent request.
    pub fn last_request(&self) -> Option<RequestDescriptor> {
        self.lock().requests.last().map(|r| r.descriptor.clone())
    }

    fn push(&self, outcome: Outcome) -> &Self {
        self.lock().script.push_back(outcome);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<UpstreamResponse, TransportFailure> {
        let (outcome, delay) = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                descriptor: descriptor.clone(),
                at: Instant::now(),
            });
            let outcome = match state.script.pop_front() {
                Some(outcome) => outcome,
                None => state
                    .fallback
                    .clone()
                    .unwrap_or_else(|| Ok(UpstreamResponse::ok(None))),
            };
            (outcome, state.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
