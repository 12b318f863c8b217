//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::error::{ExecError, ExecResult};
use crate::ports::{Transport, TransportFailure, UpstreamResponse};

/// One HTTP attempt per `send`, bounded by a per-attempt timeout.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport for `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ExecResult<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url)
            .map_err(|e| ExecError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecError::Client(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<UpstreamResponse, TransportFailure> {
        let mut request = self
            .client
            .request(descriptor.method.clone(), self.url_for(&descriptor.path));

        for (name, value) in &descriptor.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_reqwest_error)?;

        if !response_ok(status) {
            return Err(TransportFailure::Status {
                status,
                body: parse_body(status, &text).ok().flatten(),
            });
        }

        Ok(UpstreamResponse {
            status,
            body: parse_body(status, &text)?,
        })
    }
}

fn response_ok(status: u16) -> bool {
    (200..300).contains(&status)
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn parse_body(status: u16, text: &str) -> Result<Option<Value>, TransportFailure> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(TransportFailure::Malformed {
            status,
            reason: e.to_string(),
        }),
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        TransportFailure::Timeout(error.to_string())
    } else {
        TransportFailure::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.io/api/", "/purchases"), "https://a.io/api/purchases");
        assert_eq!(join_url("https://a.io/api", "purchases"), "https://a.io/api/purchases");
        assert_eq!(join_url("https://a.io", ""), "https://a.io");
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(200, "").unwrap(), None);
        assert_eq!(parse_body(200, "  ").unwrap(), None);
        assert_eq!(parse_body(200, "null").unwrap(), None);
        assert_eq!(parse_body(200, r#"{"a":1}"#).unwrap(), Some(json!({"a": 1})));
        assert!(matches!(
            parse_body(200, "<html>"),
            Err(TransportFailure::Malformed { status: 200, .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = ReqwestTransport::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ExecError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        // Port 9 (discard) on localhost is closed in test environments
        let transport = ReqwestTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        let result = transport.send(&mut RequestDescriptor::get("/health")).await;

        assert!(matches!(
            result,
            Err(TransportFailure::Network(_)) | Err(TransportFailure::Timeout(_))
        ));
    }
}
