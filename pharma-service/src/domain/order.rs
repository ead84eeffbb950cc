use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::round_cents;
use crate::storage::{EntityId, MemoryEntity, Record};
use crate::validation::{Fields, Schema, ValidationErrors};

/// Lifecycle of a customer order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Received, not yet confirmed
    #[default]
    Pending,
    /// Accepted and being prepared
    Confirmed,
    /// Left the warehouse
    Shipped,
    /// Received by the customer
    Delivered,
    /// Withdrawn before delivery
    Cancelled,
}

impl OrderStatus {
    /// Wire names of every status, in lifecycle order
    pub const ALL: [&'static str; 5] = ["pending", "confirmed", "shipped", "delivered", "cancelled"];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// One product line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Product being ordered
    pub product_id: EntityId,
    /// Units, at least 1
    pub quantity: i64,
    /// Agreed price per unit
    pub unit_price: f64,
    /// Percentage discount, 0 to 100
    pub discount: f64,
}

impl OrderLine {
    /// Quantity times price less the discount, rounded to cents
    pub fn amount(&self) -> f64 {
        round_cents(self.quantity as f64 * self.unit_price * (1.0 - self.discount / 100.0))
    }

    fn parse(fields: &mut Fields<'_>) -> Option<Self> {
        let product_id = fields.required_id("productId");
        let quantity = fields.required_i64("quantity");
        fields.check_min_i64("quantity", quantity, 1);
        let unit_price = fields.required_f64("unitPrice");
        fields.check_min_f64("unitPrice", unit_price, 0.0);
        let discount = fields.optional_f64("discount");
        if let Some(d) = discount {
            fields.ensure(
                (0.0..=100.0).contains(&d),
                "discount",
                "out_of_range",
                "discount must be between 0 and 100",
            );
        }

        Some(Self {
            product_id: product_id?,
            quantity: quantity?,
            unit_price: round_cents(unit_price?),
            discount: discount.unwrap_or(0.0),
        })
    }
}

/// Prefix of references generated from the order id
pub const GENERATED_REFERENCE_PREFIX: &str = "ORD-";

fn generated_reference(id: EntityId) -> String {
    format!("{GENERATED_REFERENCE_PREFIX}{id:06}")
}

/// `ORD-` followed only by digits; reserved for generated references
fn is_generated_reference(reference: &str) -> bool {
    reference
        .strip_prefix(GENERATED_REFERENCE_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn lines_total(lines: &[OrderLine]) -> f64 {
    round_cents(lines.iter().map(OrderLine::amount).sum())
}

/// A customer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Storage-assigned id
    pub id: EntityId,
    /// Unique order reference
    pub reference: String,
    /// Ordering customer
    pub customer_id: EntityId,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Ordered products, at least one
    pub lines: Vec<OrderLine>,
    /// Sum of the line amounts, rounded to cents
    pub total: f64,
    /// Internal notes
    pub notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Record for Order {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Validated input for `POST /api/orders`
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// Generated from the id when absent
    pub reference: Option<String>,
    /// Ordering customer
    pub customer_id: EntityId,
    /// Initial status, `pending` when absent
    pub status: OrderStatus,
    /// Ordered products, at least one
    pub lines: Vec<OrderLine>,
    /// Internal notes
    pub notes: Option<String>,
}

impl Schema for NewOrder {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let reference = fields
            .optional_str_len("reference", 3, 40)
            .map(|r| r.to_uppercase());
        if let Some(reference) = &reference {
            fields.ensure(
                !is_generated_reference(reference),
                "reference",
                "reserved_reference",
                "reference must not use the generated ORD-<number> form",
            );
        }
        let customer_id = fields.required_id("customerId");
        let status = fields.optional_enum("status", &OrderStatus::ALL);
        let lines = fields.required_objects("lines", OrderLine::parse);
        let notes = fields.optional_str_len("notes", 1, 1000);
        fields.finish()?;

        Ok(Self {
            reference,
            customer_id: customer_id.unwrap_or_default(),
            status: status.unwrap_or_default(),
            lines: lines.unwrap_or_default(),
            notes,
        })
    }
}

/// Validated input for `PUT /api/orders/{id}`; a new set of lines replaces the old one
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<OrderLine>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Schema for OrderChanges {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let status = fields.optional_enum("status", &OrderStatus::ALL);
        let lines = fields.optional_objects("lines", OrderLine::parse);
        if let Some(lines) = &lines {
            fields.ensure(
                !lines.is_empty(),
                "lines",
                "too_small",
                "lines must contain at least 1 item",
            );
        }
        let notes = fields.optional_str_len("notes", 1, 1000);
        fields.finish()?;
        Ok(Self {
            status,
            lines,
            notes,
        })
    }
}

impl MemoryEntity for Order {
    type Create = NewOrder;
    type Update = OrderChanges;
    const ENTITY: &'static str = "Order";

    fn from_create(id: EntityId, data: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            id,
            reference: data.reference.unwrap_or_else(|| generated_reference(id)),
            customer_id: data.customer_id,
            status: data.status,
            total: lines_total(&data.lines),
            lines: data.lines,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, data: OrderChanges, now: DateTime<Utc>) {
        if let Some(status) = data.status {
            self.status = status;
        }
        if let Some(lines) = data.lines {
            self.total = lines_total(&lines);
            self.lines = lines;
        }
        if data.notes.is_some() {
            self.notes = data.notes;
        }
        self.updated_at = now;
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("reference", self.reference.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_order() -> NewOrder {
        NewOrder::parse(&json!({
            "customerId": 3,
            "lines": [
                { "productId": 1, "quantity": 10, "unitPrice": 2.5 },
                { "productId": 2, "quantity": "2", "unitPrice": 10, "discount": 15 },
            ],
        }))
        .unwrap()
    }

    #[test]
    fn test_total_and_generated_reference() {
        let order = Order::from_create(42, new_order(), Utc::now());
        assert_eq!(order.reference, "ORD-000042");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, 42.0);
    }

    #[test]
    fn test_generated_reference_form_is_reserved() {
        for reference in ["ORD-000002", "ord-000002", "ORD-1234567"] {
            let errors = NewOrder::parse(&json!({
                "reference": reference,
                "customerId": 3,
                "lines": [{ "productId": 1, "quantity": 1, "unitPrice": 1 }],
            }))
            .unwrap_err();
            assert_eq!(errors.violations()[0].field, "reference");
            assert_eq!(errors.violations()[0].code, "reserved_reference");
        }

        let order = NewOrder::parse(&json!({
            "reference": "ord-2024-a",
            "customerId": 3,
            "lines": [{ "productId": 1, "quantity": 1, "unitPrice": 1 }],
        }))
        .unwrap();
        assert_eq!(order.reference.as_deref(), Some("ORD-2024-A"));
    }

    #[test]
    fn test_line_violations_use_nested_paths() {
        let errors = NewOrder::parse(&json!({
            "customerId": 3,
            "status": "lost",
            "lines": [
                { "productId": 1, "quantity": 1, "unitPrice": 1 },
                { "productId": 0, "quantity": 0, "unitPrice": 1 },
            ],
        }))
        .unwrap_err();
        let fields: Vec<_> = errors
            .violations()
            .iter()
            .map(|v| (v.field.as_str(), v.code.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("status", "invalid_enum"),
                ("lines.1.productId", "too_small"),
                ("lines.1.quantity", "too_small"),
            ]
        );
    }

    #[test]
    fn test_lines_are_required() {
        let errors = NewOrder::parse(&json!({ "customerId": 3, "lines": [] })).unwrap_err();
        assert_eq!(errors.violations()[0].field, "lines");
        assert_eq!(errors.violations()[0].code, "too_small");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(OrderStatus::Shipped).unwrap(), json!("shipped"));
        assert_eq!(
            "CANCELLED".to_lowercase().parse::<OrderStatus>(),
            Ok(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_changing_lines_recomputes_total() {
        let mut order = Order::from_create(1, new_order(), Utc::now());
        let changes = OrderChanges::parse(&json!({
            "status": "Confirmed",
            "lines": [{ "productId": 1, "quantity": 4, "unitPrice": 2.5 }],
        }))
        .unwrap();
        order.apply_update(changes, Utc::now());
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.total, 10.0);
        assert_eq!(order.lines.len(), 1);
    }
}
