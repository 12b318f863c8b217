//! End-to-end workflow tests over real adapters and executors, with scripted
//! upstream transports.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use relay_connectors::{BookingAdapter, LoyaltyAdapter};
use relay_domain::{AuditSource, ErrorKind, PurchaseItem};
use relay_exec::{
    BreakerConfig, ExecutorConfig, HttpExecutor, RequestContext, StubTransport, REQUEST_ID_HEADER,
    TRACE_ID_HEADER,
};
use relay_store::{MemoryAuditLog, MemoryPurchaseQueue};
use relay_workflow::{ProcessPurchase, ProcessPurchaseInput, PurchaseStatus};
use rust_decimal_macros::dec;
use serde_json::json;

fn executor(base_url: &str, stub: &StubTransport, max_retries: u32) -> Arc<HttpExecutor<StubTransport>> {
    let config = ExecutorConfig::new(base_url)
        .with_max_retries(max_retries)
        .with_breaker(BreakerConfig::default());
    Arc::new(HttpExecutor::with_transport(config, stub.clone()))
}

fn input(external_id: &str) -> ProcessPurchaseInput {
    ProcessPurchaseInput {
        external_purchase_id: external_id.to_string(),
        buyer_id: "buyer-1".to_string(),
        amount: dec!(100),
        currency: "RUB".to_string(),
        items: vec![PurchaseItem {
            id: "i1".to_string(),
            name: "x".to_string(),
            quantity: 1,
            price: dec!(100),
        }],
        purchased_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        metadata: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_direct_purchase_flows_to_loyalty_and_queue() {
    let loyalty_stub = StubTransport::new();
    let loyalty = LoyaltyAdapter::new(executor("https://loyalty.test", &loyalty_stub, 3), "tok");
    let audit = Arc::new(MemoryAuditLog::new());
    let queue = Arc::new(MemoryPurchaseQueue::default());
    let workflow = ProcessPurchase::new(Arc::new(loyalty), audit.clone(), queue.clone());

    let context = RequestContext::new("trace-42", Some("req-42".to_string()));
    let outcome = context.scope(workflow.execute(input("ext-1"))).await.unwrap();

    assert_eq!(outcome.status, PurchaseStatus::Queued);
    assert_eq!(audit.len(), 1);
    assert!(audit.find("ext-1", AuditSource::Loyalty).is_some());
    assert_eq!(queue.len(), 1);

    let sent = loyalty_stub.last_request().unwrap();
    assert_eq!(sent.path, "/purchases");
    assert_eq!(sent.header(TRACE_ID_HEADER), Some("trace-42"));
    assert_eq!(sent.header(REQUEST_ID_HEADER), Some("req-42"));
    assert_eq!(sent.body.unwrap()["externalPurchaseId"], json!("ext-1"));
}

#[tokio::test(start_paused = true)]
async fn test_source_augmented_merges_booking_metadata() {
    let booking_stub = StubTransport::always_ok(Some(json!({
        "id": "yc-1",
        "total_sum": 500,
        "currency": "USD",
        "client_id": 77,
        "items": [{"id": "g-1", "goods_title": "Pedicure", "quantity": 1, "price": 500}],
        "date": "2024-01-01 08:00:00",
        "metadata": {"a": 1}
    })));
    let loyalty_stub = StubTransport::new();
    let booking = BookingAdapter::new(executor("https://booking.test", &booking_stub, 3), "btok");
    let loyalty = LoyaltyAdapter::new(executor("https://loyalty.test", &loyalty_stub, 3), "tok");
    let workflow = ProcessPurchase::new(
        Arc::new(loyalty),
        Arc::new(MemoryAuditLog::new()),
        Arc::new(MemoryPurchaseQueue::default()),
    )
    .with_source(Arc::new(booking));

    let mut request = input("ext-7");
    request.metadata = json!({"b": 2}).as_object().cloned();
    workflow.execute(request).await.unwrap();

    assert_eq!(booking_stub.last_request().unwrap().path, "/purchases/ext-7");
    let body = loyalty_stub.last_request().unwrap().body.unwrap();
    assert_eq!(body["metadata"], json!({"a": 1, "b": 2}));
    assert_eq!(body["amount"], json!(100.0));
    assert_eq!(body["currency"], json!("RUB"));
    assert_eq!(body["buyerId"], json!("buyer-1"));
    assert_eq!(body["items"][0]["name"], json!("Pedicure"));
}

#[tokio::test(start_paused = true)]
async fn test_loyalty_outage_surfaces_retry_exhausted() {
    let loyalty_stub = StubTransport::always_status(503);
    let loyalty = LoyaltyAdapter::new(executor("https://loyalty.test", &loyalty_stub, 2), "tok");
    let audit = Arc::new(MemoryAuditLog::new());
    let queue = Arc::new(MemoryPurchaseQueue::default());
    let workflow = ProcessPurchase::new(Arc::new(loyalty), audit.clone(), queue.clone());

    let err = workflow.execute(input("ext-3")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert_eq!(loyalty_stub.call_count(), 3);
    assert_eq!(audit.len(), 1);
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_booking_purchase_is_not_found() {
    let booking_stub = StubTransport::always_ok(None);
    let loyalty_stub = StubTransport::new();
    let booking = BookingAdapter::new(executor("https://booking.test", &booking_stub, 0), "btok");
    let loyalty = LoyaltyAdapter::new(executor("https://loyalty.test", &loyalty_stub, 0), "tok");
    let audit = Arc::new(MemoryAuditLog::new());
    let workflow = ProcessPurchase::new(
        Arc::new(loyalty),
        audit.clone(),
        Arc::new(MemoryPurchaseQueue::default()),
    )
    .with_source(Arc::new(booking));

    let err = workflow.execute(input("ext-404")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Upstream4xx);
    assert_eq!(err.status_code(), 404);
    assert!(audit.is_empty());
    assert_eq!(loyalty_stub.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_itemless_booking_purchase_is_rejected() {
    let booking_stub = StubTransport::always_ok(Some(json!({
        "id": "yc-2",
        "total_sum": 0,
        "currency": "RUB",
        "client_id": "c-1",
        "items": [],
        "date": "2024-01-01 08:00:00"
    })));
    let loyalty_stub = StubTransport::new();
    let booking = BookingAdapter::new(executor("https://booking.test", &booking_stub, 0), "btok");
    let loyalty = LoyaltyAdapter::new(executor("https://loyalty.test", &loyalty_stub, 0), "tok");
    let audit = Arc::new(MemoryAuditLog::new());
    let queue = Arc::new(MemoryPurchaseQueue::default());
    let workflow = ProcessPurchase::new(Arc::new(loyalty), audit.clone(), queue.clone())
        .with_source(Arc::new(booking));

    let err = workflow.execute(input("ext-empty")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status_code(), 400);
    assert!(audit.is_empty());
    assert!(queue.is_empty());
    assert_eq!(loyalty_stub.call_count(), 0);
}
