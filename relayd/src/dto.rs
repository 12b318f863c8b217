//! Request and response bodies of the purchase endpoint.
//!
//! Bodies are deserialized into typed requests; serde reports shape errors
//! (missing fields, wrong types) and `validate` reports range and length
//! violations, all of them at once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_domain::{Metadata, PurchaseItem};
use relay_workflow::{ProcessPurchaseInput, PurchaseStatus};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Body of `POST /api/v1/purchases`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseRequest {
    pub external_purchase_id: String,
    pub buyer_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub items: Vec<PurchaseItemRequest>,
    pub purchased_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// One line item of a purchase request.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseItemRequest {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Accepted purchase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseResponse {
    pub status: PurchaseStatus,
    pub trace_id: String,
    pub request_id: String,
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Path to the offending field, e.g. `["items", 0, "price"]`
    pub path: Vec<Value>,
    /// What is wrong with it
    pub message: String,
}

impl Issue {
    fn new(path: Vec<Value>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

impl CreatePurchaseRequest {
    /// Range and length rules serde cannot express.
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        if self.external_purchase_id.is_empty() {
            issues.push(Issue::new(path(&["externalPurchaseId"]), "Must not be empty"));
        }
        if self.buyer_id.is_empty() {
            issues.push(Issue::new(path(&["buyerId"]), "Must not be empty"));
        }
        if self.amount <= Decimal::ZERO {
            issues.push(Issue::new(path(&["amount"]), "Must be greater than 0"));
        }
        if self.currency.chars().count() != 3 {
            issues.push(Issue::new(path(&["currency"]), "Must be exactly 3 characters"));
        }
        if self.items.is_empty() {
            issues.push(Issue::new(path(&["items"]), "Must contain at least 1 item"));
        }

        for (index, item) in self.items.iter().enumerate() {
            let at = |field: &str| {
                vec![Value::from("items"), Value::from(index), Value::from(field)]
            };
            if item.id.is_empty() {
                issues.push(Issue::new(at("id"), "Must not be empty"));
            }
            if item.name.is_empty() {
                issues.push(Issue::new(at("name"), "Must not be empty"));
            }
            if item.quantity == 0 {
                issues.push(Issue::new(at("quantity"), "Must be greater than 0"));
            }
            if item.price < Decimal::ZERO {
                issues.push(Issue::new(at("price"), "Must be greater than or equal to 0"));
            }
        }

        issues
    }

    /// Workflow input for a validated request.
    pub fn into_input(self) -> ProcessPurchaseInput {
        ProcessPurchaseInput {
            external_purchase_id: self.external_purchase_id,
            buyer_id: self.buyer_id,
            amount: self.amount,
            currency: self.currency,
            items: self
                .items
                .into_iter()
                .map(|item| PurchaseItem {
                    id: item.id,
                    name: item.name,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            purchased_at: self.purchased_at,
            metadata: self.metadata,
        }
    }
}

/// Decode and validate a raw request body.
pub fn parse_create_purchase(body: &[u8]) -> Result<ProcessPurchaseInput, Vec<Issue>> {
    let request: CreatePurchaseRequest = serde_json::from_slice(body)
        .map_err(|e| vec![Issue::new(Vec::new(), e.to_string())])?;

    let issues = request.validate();
    if !issues.is_empty() {
        return Err(issues);
    }
    Ok(request.into_input())
}

fn path(segments: &[&str]) -> Vec<Value> {
    segments.iter().map(|s| Value::from(*s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "externalPurchaseId": "ext-1",
            "buyerId": "79001234567",
            "amount": 1500.5,
            "currency": "RUB",
            "items": [{"id": "i-1", "name": "Haircut", "quantity": 1, "price": 1500.5}],
            "purchasedAt": "2024-01-01T10:00:00.000Z",
            "metadata": {"source": "pos"}
        })
    }

    fn parse(value: &Value) -> Result<ProcessPurchaseInput, Vec<Issue>> {
        parse_create_purchase(value.to_string().as_bytes())
    }

    fn paths(issues: &[Issue]) -> Vec<Value> {
        issues.iter().map(|i| Value::Array(i.path.clone())).collect()
    }

    #[test]
    fn test_valid_body_parses() {
        let input = parse(&valid()).unwrap();

        assert_eq!(input.external_purchase_id, "ext-1");
        assert_eq!(input.amount, dec!(1500.5));
        assert_eq!(input.items[0].price, dec!(1500.5));
        assert_eq!(input.items[0].quantity, 1);
        assert_eq!(
            input.purchased_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(input.metadata.unwrap()["source"], json!("pos"));
    }

    #[test]
    fn test_offset_timestamp_normalized_to_utc() {
        let mut body = valid();
        body["purchasedAt"] = json!("2024-01-01T13:00:00+03:00");

        let input = parse(&body).unwrap();

        assert_eq!(
            input.purchased_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_metadata_optional() {
        let mut body = valid();
        body.as_object_mut().unwrap().remove("metadata");

        assert!(parse(&body).unwrap().metadata.is_none());
    }

    #[test]
    fn test_range_violations_all_reported() {
        let body = json!({
            "externalPurchaseId": "",
            "buyerId": "b",
            "amount": 0,
            "currency": "RUBL",
            "items": [{"id": "i-1", "name": "", "quantity": 0, "price": -1}],
            "purchasedAt": "2024-01-01T10:00:00Z"
        });

        let issues = parse(&body).unwrap_err();

        assert_eq!(
            paths(&issues),
            vec![
                json!(["externalPurchaseId"]),
                json!(["amount"]),
                json!(["currency"]),
                json!(["items", 0, "name"]),
                json!(["items", 0, "quantity"]),
                json!(["items", 0, "price"]),
            ]
        );
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut body = valid();
        body["items"] = json!([]);

        let issues = parse(&body).unwrap_err();

        assert_eq!(paths(&issues), vec![json!(["items"])]);
    }

    #[test]
    fn test_free_item_allowed() {
        let mut body = valid();
        body["items"] = json!([{"id": "b", "name": "y", "quantity": 2, "price": 0}]);

        assert!(parse(&body).is_ok());
    }

    #[test]
    fn test_shape_errors_are_single_issue() {
        let mut missing = valid();
        missing.as_object_mut().unwrap().remove("buyerId");
        let issues = parse(&missing).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.is_empty());
        assert!(issues[0].message.contains("buyerId"));

        let mut fractional = valid();
        fractional["items"][0]["quantity"] = json!(1.5);
        assert_eq!(parse(&fractional).unwrap_err().len(), 1);

        let mut bad_date = valid();
        bad_date["purchasedAt"] = json!("yesterday");
        assert_eq!(parse(&bad_date).unwrap_err().len(), 1);

        assert_eq!(parse_create_purchase(b"{not json").unwrap_err().len(), 1);
        assert_eq!(parse_create_purchase(b"[1,2]").unwrap_err().len(), 1);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = CreatePurchaseResponse {
            status: PurchaseStatus::Queued,
            trace_id: "t".to_string(),
            request_id: "r".to_string(),
        };

        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"status": "queued", "traceId": "t", "requestId": "r"})
        );
    }
}
