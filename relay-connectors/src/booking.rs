//! Booking system API adapter.
//!
//! `GET /purchases/{id}` with a bearer token, mapped into a domain
//! `Purchase`. Upstream ids may arrive as strings or numbers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use relay_domain::{AppError, AppResult, Buyer, Metadata, Purchase, PurchaseItem};
use relay_exec::{decode_body, RequestDescriptor, RequestExecutor};

/// Everything outside RFC 3986 unreserved characters is escaped in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Purchase as the booking system returns it.
#[derive(Debug, Deserialize)]
struct BookingPurchase {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    total_sum: Decimal,
    currency: String,
    #[serde(deserialize_with = "string_or_number")]
    client_id: String,
    #[serde(default)]
    items: Vec<BookingItem>,
    date: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct BookingItem {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    goods_title: String,
    quantity: u32,
    price: Decimal,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number, got {}", other))),
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Booking system adapter.
pub struct BookingAdapter {
    executor: Arc<dyn RequestExecutor>,
    token: String,
}

impl BookingAdapter {
    /// Create an adapter over `executor`, authenticating with `token`.
    pub fn new(executor: Arc<dyn RequestExecutor>, token: impl Into<String>) -> Self {
        Self {
            executor,
            token: token.into(),
        }
    }

    /// Fetch a purchase by its external id.
    ///
    /// An empty body is reported as `UPSTREAM_4XX/404`.
    pub async fn get_purchase(&self, external_purchase_id: &str) -> AppResult<Purchase> {
        let id = utf8_percent_encode(external_purchase_id, PATH_SEGMENT);
        let descriptor = RequestDescriptor::get(format!("/purchases/{}", id))
            .with_header("Authorization", format!("Bearer {}", self.token));

        let body = self.executor.execute(descriptor).await?;
        let upstream: BookingPurchase = decode_body(body)?
            .ok_or_else(|| AppError::not_found("Purchase not found in booking system"))?;

        debug!(external_id = %external_purchase_id, booking_id = %upstream.id, "Purchase fetched from booking system");
        into_purchase(upstream, external_purchase_id)
    }
}

fn into_purchase(upstream: BookingPurchase, external_id: &str) -> AppResult<Purchase> {
    let purchased_at = parse_date(&upstream.date).ok_or_else(|| {
        AppError::internal("Malformed upstream response")
            .with_details(serde_json::json!({ "field": "date", "value": upstream.date }))
    })?;

    Ok(Purchase {
        id: upstream.id,
        external_id: external_id.to_string(),
        buyer: Buyer { id: upstream.client_id },
        amount: upstream.total_sum,
        currency: upstream.currency,
        items: upstream
            .items
            .into_iter()
            .map(|item| PurchaseItem {
                id: item.id,
                name: item.goods_title,
                quantity: item.quantity,
                price: item.price,
            })
            .collect(),
        purchased_at,
        metadata: upstream.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use relay_domain::ErrorKind;
    use relay_exec::{BreakerConfig, ExecutorConfig, HttpExecutor, StubTransport};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn adapter(stub: &StubTransport) -> BookingAdapter {
        let config = ExecutorConfig::new("https://booking.test")
            .with_max_retries(0)
            .with_breaker(BreakerConfig::default());
        BookingAdapter::new(
            Arc::new(HttpExecutor::with_transport(config, stub.clone())),
            "booking-token",
        )
    }

    #[tokio::test]
    async fn test_get_purchase_maps_fields() {
        let stub = StubTransport::always_ok(Some(json!({
            "id": 501,
            "total_sum": 3200.5,
            "currency": "RUB",
            "client_id": "c-77",
            "items": [{"id": 9, "goods_title": "Manicure", "quantity": 2, "price": 1600.25}],
            "date": "2024-05-10T09:15:00Z",
            "metadata": {"a": 1}
        })));

        let purchase = adapter(&stub).get_purchase("ext-501").await.unwrap();

        assert_eq!(purchase.id, "501");
        assert_eq!(purchase.external_id, "ext-501");
        assert_eq!(purchase.buyer.id, "c-77");
        assert_eq!(purchase.amount, dec!(3200.5));
        assert_eq!(purchase.currency, "RUB");
        assert_eq!(purchase.items.len(), 1);
        assert_eq!(purchase.items[0].id, "9");
        assert_eq!(purchase.items[0].name, "Manicure");
        assert_eq!(purchase.items[0].quantity, 2);
        assert_eq!(purchase.items[0].price, dec!(1600.25));
        assert_eq!(purchase.purchased_at, Utc.with_ymd_and_hms(2024, 5, 10, 9, 15, 0).unwrap());
        assert_eq!(purchase.metadata, json!({"a": 1}).as_object().cloned());

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.path, "/purchases/ext-501");
        assert_eq!(sent.header("authorization"), Some("Bearer booking-token"));
    }

    #[tokio::test]
    async fn test_purchase_id_is_escaped_in_path() {
        let stub = StubTransport::always_ok(None);

        let _ = adapter(&stub).get_purchase("a/b?c=1 d").await;

        assert_eq!(stub.last_request().unwrap().path, "/purchases/a%2Fb%3Fc%3D1%20d");
    }

    #[tokio::test]
    async fn test_empty_body_is_not_found() {
        let stub = StubTransport::always_ok(None);

        let err = adapter(&stub).get_purchase("missing").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Upstream4xx);
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_upstream_404_is_classified_by_executor() {
        let stub = StubTransport::always_status(404);

        let err = adapter(&stub).get_purchase("missing").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Upstream4xx);
        assert_eq!(err.status_code(), 404);
        assert!(err.details().is_some());
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_internal_error() {
        let stub = StubTransport::always_ok(Some(json!({"id": "1", "total_sum": "lots"})));

        let err = adapter(&stub).get_purchase("ext-1").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 10, 9, 15, 0).unwrap();

        assert_eq!(parse_date("2024-05-10T09:15:00Z"), Some(expected));
        assert_eq!(parse_date("2024-05-10T12:15:00+03:00"), Some(expected));
        assert_eq!(parse_date("2024-05-10 09:15:00"), Some(expected));
        assert_eq!(parse_date("10/05/2024"), None);
    }
}
