//! Loyalty program API adapter.
//!
//! Endpoints (all `POST`, raw token in `Authorization`):
//! - `/purchases` - forward a purchase
//! - `/buyer-info` - look a buyer up by normalized phone
//! - `/buyer-register` - register a buyer (snake_case body)

use std::sync::Arc;

use chrono::SecondsFormat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use relay_domain::{AppError, AppResult, Metadata, Purchase};
use relay_exec::{decode_body, RequestDescriptor, RequestExecutor};

// =============================================================================
// Phone Normalization
// =============================================================================

/// Normalize a phone number to the loyalty program's canonical form.
///
/// Non-digits are stripped. An 11-digit number with a leading `8` (Russian
/// trunk prefix) is rewritten to the leading `7` international form. Anything
/// else is returned as stripped digits, or unchanged if it has no digits.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 11 && digits.starts_with('8') {
        return format!("7{}", &digits[1..]);
    }
    if digits.is_empty() {
        return phone.to_string();
    }
    digits
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchasePayload<'a> {
    external_purchase_id: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    buyer_id: &'a str,
    purchased_at: String,
    items: Vec<ItemPayload<'a>>,
    metadata: Metadata,
}

#[derive(Debug, Serialize)]
struct ItemPayload<'a> {
    id: &'a str,
    name: &'a str,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
}

impl<'a> PurchasePayload<'a> {
    fn from_purchase(purchase: &'a Purchase) -> Self {
        Self {
            external_purchase_id: &purchase.external_id,
            amount: purchase.amount,
            currency: &purchase.currency,
            buyer_id: &purchase.buyer.id,
            purchased_at: purchase
                .purchased_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            items: purchase
                .items
                .iter()
                .map(|item| ItemPayload {
                    id: &item.id,
                    name: &item.name,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            metadata: purchase.metadata.clone().unwrap_or_default(),
        }
    }
}

/// Buyer gender as the loyalty API spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male
    Male,
    /// Female
    Female,
}

/// Buyer registration input. Every field is optional; absent fields are
/// omitted from the upstream body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBuyerPayload {
    pub phone: Option<String>,
    pub referral_code: Option<String>,
    pub card_number: Option<String>,
    pub surname: Option<String>,
    pub name: Option<String>,
    pub middle_name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub child1_birth_date: Option<String>,
    pub child1_name: Option<String>,
    pub child1_gender: Option<Gender>,
    pub child2_birth_date: Option<String>,
    pub child2_name: Option<String>,
    pub child2_gender: Option<Gender>,
    pub child3_birth_date: Option<String>,
    pub child3_name: Option<String>,
    pub child3_gender: Option<Gender>,
    pub child4_birth_date: Option<String>,
    pub child4_name: Option<String>,
    pub child4_gender: Option<Gender>,
    pub registration_channel: Option<String>,
    pub registration_point: Option<String>,
    pub group_id: Option<String>,
    pub city_id: Option<String>,
    pub phone_checked: Option<bool>,
    pub refused_receive_messages: Option<bool>,
    pub refused_receive_emails: Option<bool>,
    pub agreed_receive_electronic_receipt: Option<bool>,
    pub init_purchase_count: Option<u32>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub init_payment_amount: Option<Decimal>,
    pub cashier_name: Option<String>,
    pub external_id: Option<String>,
    pub promocode: Option<String>,
}

/// Request field → upstream field. `phone` is handled separately.
const FIELD_MAP: &[(&str, &str)] = &[
    ("referralCode", "referral_code"),
    ("cardNumber", "card_number"),
    ("surname", "surname"),
    ("name", "name"),
    ("middleName", "middle_name"),
    ("birthDate", "birth_date"),
    ("gender", "gender"),
    ("email", "email"),
    ("child1BirthDate", "child1_birth_date"),
    ("child1Name", "child1_name"),
    ("child1Gender", "child1_gender"),
    ("child2BirthDate", "child2_birth_date"),
    ("child2Name", "child2_name"),
    ("child2Gender", "child2_gender"),
    ("child3BirthDate", "child3_birth_date"),
    ("child3Name", "child3_name"),
    ("child3Gender", "child3_gender"),
    ("child4BirthDate", "child4_birth_date"),
    ("child4Name", "child4_name"),
    ("child4Gender", "child4_gender"),
    ("registrationChannel", "registration_channel"),
    ("registrationPoint", "registration_point"),
    ("groupId", "group_id"),
    ("cityId", "city_id"),
    ("phoneChecked", "phone_checked"),
    ("refusedReceiveMessages", "is_refused_receive_messages"),
    ("refusedReceiveEmails", "is_refused_receive_emails"),
    ("agreedReceiveElectronicReceipt", "is_agreed_receive_electronic_receipt"),
    ("initPurchaseCount", "init_purchase_count"),
    ("initPaymentAmount", "init_payment_amount"),
    ("cashierName", "cashier_name"),
    ("externalId", "external_id"),
    ("promocode", "promocode"),
];

/// Registration result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterBuyerResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_register: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_registered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegisterBuyerResponse {
    /// Whether either registration flag is set.
    pub fn registered(&self) -> bool {
        self.is_register == Some(true) || self.is_registered == Some(true)
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Loyalty program adapter.
pub struct LoyaltyAdapter {
    executor: Arc<dyn RequestExecutor>,
    token: String,
}

impl LoyaltyAdapter {
    /// Create an adapter over `executor`, authenticating with `token`.
    pub fn new(executor: Arc<dyn RequestExecutor>, token: impl Into<String>) -> Self {
        Self {
            executor,
            token: token.into(),
        }
    }

    /// Forward a purchase. The response body is ignored.
    pub async fn create_purchase(&self, purchase: &Purchase) -> AppResult<()> {
        let payload = to_json(&PurchasePayload::from_purchase(purchase))?;

        self.executor
            .execute(self.post("/purchases").with_json(payload))
            .await?;

        info!(external_id = %purchase.external_id, "Purchase forwarded to loyalty program");
        Ok(())
    }

    /// Whether the buyer identified by `buyer_id` (a phone) is registered.
    ///
    /// An empty response means "not registered".
    pub async fn is_buyer_registered(&self, buyer_id: &str) -> AppResult<bool> {
        let body = json!({ "identificator": normalize_phone(buyer_id) });
        let response = self
            .executor
            .execute(self.post("/buyer-info").with_json(body))
            .await?;

        let info: Option<Map<String, Value>> = decode_body(response)?;
        let registered = info.is_some_and(|info| {
            info.get("is_register").is_some_and(truthy)
                || info.get("is_registered").is_some_and(truthy)
        });

        debug!(registered, "Buyer lookup completed");
        Ok(registered)
    }

    /// Register a buyer.
    pub async fn register_buyer(
        &self,
        payload: &RegisterBuyerPayload,
    ) -> AppResult<RegisterBuyerResponse> {
        let body = build_register_body(payload)?;
        let response = self
            .executor
            .execute(self.post("/buyer-register").with_json(Value::Object(body)))
            .await?;

        Ok(decode_body(response)?.unwrap_or_default())
    }

    fn post(&self, path: &str) -> RequestDescriptor {
        RequestDescriptor::post(path).with_header("Authorization", self.token.as_str())
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::internal("Failed to encode upstream payload").with_cause(e))
}

fn build_register_body(payload: &RegisterBuyerPayload) -> AppResult<Map<String, Value>> {
    let source = match to_json(payload)? {
        Value::Object(map) => map,
        _ => return Err(AppError::internal("Failed to encode upstream payload")),
    };

    let mut body = Map::new();
    if let Some(phone) = payload.phone.as_deref() {
        let normalized = normalize_phone(phone);
        if !normalized.is_empty() {
            body.insert("phone".to_string(), Value::String(normalized));
        }
    }

    for (from, to) in FIELD_MAP {
        match source.get(*from) {
            None | Some(Value::Null) => {},
            Some(value) => {
                body.insert((*to).to_string(), value.clone());
            },
        }
    }

    Ok(body)
}

/// Loose truthiness for legacy upstream flags (`true`, `1`, `"1"`).
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use relay_domain::{Buyer, ErrorKind, PurchaseItem};
    use relay_exec::{BreakerConfig, ExecutorConfig, HttpExecutor, StubTransport};
    use rust_decimal_macros::dec;

    fn adapter(stub: &StubTransport) -> LoyaltyAdapter {
        let config = ExecutorConfig::new("https://loyalty.test")
            .with_max_retries(0)
            .with_breaker(BreakerConfig::default());
        LoyaltyAdapter::new(
            Arc::new(HttpExecutor::with_transport(config, stub.clone())),
            "loyalty-token",
        )
    }

    fn purchase() -> Purchase {
        Purchase {
            id: "p-1".to_string(),
            external_id: "ext-1".to_string(),
            buyer: Buyer { id: "79001234567".to_string() },
            amount: dec!(199.5),
            currency: "RUB".to_string(),
            items: vec![PurchaseItem {
                id: "i-1".to_string(),
                name: "Massage".to_string(),
                quantity: 1,
                price: dec!(199.5),
            }],
            purchased_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            metadata: None,
        }
    }

    #[test]
    fn test_normalize_phone_equivalent_forms() {
        let forms = [
            "+7 (900) 123-45-67",
            "8 900 123 45 67",
            "89001234567",
            "79001234567",
            "7-900-123-45-67",
        ];

        for form in forms {
            assert_eq!(normalize_phone(form), "79001234567", "form {form}");
        }
    }

    #[test]
    fn test_normalize_phone_other_lengths() {
        assert_eq!(normalize_phone("+1 (555) 010-99"), "155501099");
        assert_eq!(normalize_phone("buyer"), "buyer");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_register_body_maps_fields_and_omits_absent() {
        let payload = RegisterBuyerPayload {
            phone: Some("8 (900) 123-45-67".to_string()),
            name: Some("Anna".to_string()),
            middle_name: Some("Petrovna".to_string()),
            child1_gender: Some(Gender::Female),
            refused_receive_emails: Some(true),
            init_purchase_count: Some(2),
            init_payment_amount: Some(dec!(1500.5)),
            ..RegisterBuyerPayload::default()
        };

        let body = build_register_body(&payload).unwrap();

        assert_eq!(
            Value::Object(body),
            json!({
                "phone": "79001234567",
                "name": "Anna",
                "middle_name": "Petrovna",
                "child1_gender": "female",
                "is_refused_receive_emails": true,
                "init_purchase_count": 2,
                "init_payment_amount": 1500.5
            })
        );
    }

    #[test]
    fn test_register_body_empty_payload() {
        let body = build_register_body(&RegisterBuyerPayload::default()).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_field_map_covers_every_payload_field() {
        let serialized = to_json(&RegisterBuyerPayload::default()).unwrap();
        let fields = serialized.as_object().unwrap();

        for key in fields.keys().filter(|k| k.as_str() != "phone") {
            assert!(FIELD_MAP.iter().any(|(from, _)| from == key), "unmapped field {key}");
        }
        assert_eq!(FIELD_MAP.len() + 1, fields.len());
    }

    #[tokio::test]
    async fn test_create_purchase_payload() {
        let stub = StubTransport::new();
        let adapter = adapter(&stub);

        adapter.create_purchase(&purchase()).await.unwrap();

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.method, relay_exec::Method::POST);
        assert_eq!(sent.path, "/purchases");
        assert_eq!(sent.header("authorization"), Some("loyalty-token"));
        assert_eq!(
            sent.body.unwrap(),
            json!({
                "externalPurchaseId": "ext-1",
                "amount": 199.5,
                "currency": "RUB",
                "buyerId": "79001234567",
                "purchasedAt": "2024-03-01T12:30:00.000Z",
                "items": [{"id": "i-1", "name": "Massage", "quantity": 1, "price": 199.5}],
                "metadata": {}
            })
        );
    }

    #[tokio::test]
    async fn test_create_purchase_propagates_classified_error() {
        let stub = StubTransport::always_status(422);
        let adapter = adapter(&stub);

        let err = adapter.create_purchase(&purchase()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Upstream4xx);
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test]
    async fn test_is_buyer_registered_flag_combinations() {
        let cases = [
            (None, false),
            (Some(json!({"success": true})), false),
            (Some(json!({"success": true, "is_register": true})), true),
            (Some(json!({"success": true, "is_registered": true})), true),
            (Some(json!({"is_register": false, "is_registered": true})), true),
            (Some(json!({"is_register": true, "is_registered": false})), true),
            (Some(json!({"is_register": false, "is_registered": false})), false),
            (Some(json!({"is_register": 1})), true),
        ];

        for (body, expected) in cases {
            let stub = StubTransport::always_ok(body.clone());
            let registered = adapter(&stub).is_buyer_registered("8 900 123 45 67").await.unwrap();
            assert_eq!(registered, expected, "body {body:?}");
        }
    }

    #[tokio::test]
    async fn test_is_buyer_registered_sends_normalized_phone() {
        let stub = StubTransport::new();
        adapter(&stub).is_buyer_registered("+7 (900) 123-45-67").await.unwrap();

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.path, "/buyer-info");
        assert_eq!(sent.body, Some(json!({"identificator": "79001234567"})));
    }

    #[tokio::test]
    async fn test_register_buyer_returns_upstream_response() {
        let stub = StubTransport::always_ok(Some(json!({
            "success": true,
            "is_registered": true,
            "phone": "79001234567",
            "balance": 0
        })));

        let payload = RegisterBuyerPayload {
            phone: Some("89001234567".to_string()),
            ..RegisterBuyerPayload::default()
        };
        let response = adapter(&stub).register_buyer(&payload).await.unwrap();

        assert!(response.success);
        assert!(response.registered());
        assert_eq!(response.phone.as_deref(), Some("79001234567"));
        assert_eq!(response.extra.get("balance"), Some(&json!(0)));
        assert_eq!(stub.last_request().unwrap().path, "/buyer-register");
    }
}
