//! Request descriptor: the unit of work submitted to the executor.

use serde_json::Value;

pub use reqwest::Method;

/// Retry state threaded through every attempt of one logical call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryMetadata {
    /// Retries performed so far
    pub retry_count: u32,
    /// Set when the call failed with a retryable outcome and no budget left
    pub exhausted: bool,
}

/// Outbound request relative to an executor's base URL.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL (e.g. `/purchases`)
    pub path: String,
    /// Headers in insertion order
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Retry state for this logical call
    pub retry: RetryMetadata,
}

impl RequestDescriptor {
    /// Create a descriptor with no headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            retry: RetryMetadata::default(),
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Add a header unless one with the same name is already present.
    ///
    /// Returns `true` if the header was added.
    pub fn set_header_if_absent(&mut self, name: &str, value: &str) -> bool {
        if self.header(name).is_some() {
            return false;
        }
        self.headers.push((name.to_string(), value.to_string()));
        true
    }
}
