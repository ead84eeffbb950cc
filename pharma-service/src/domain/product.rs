use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::round_cents;
use crate::storage::{EntityId, MemoryEntity, Record};
use crate::validation::{Fields, Schema, ValidationErrors};

/// A catalogue product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Storage-assigned id
    pub id: EntityId,
    /// Catalogue code, stored uppercase and unique
    pub code: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Therapeutic or commercial category
    pub category: Option<String>,
    /// Price per unit, rounded to cents
    pub unit_price: f64,
    /// VAT percentage, 0 to 100
    pub vat_rate: f64,
    /// Units on hand
    pub stock: i64,
    /// Reorder threshold
    pub min_stock: i64,
    /// Dispensed only against a prescription
    pub requires_prescription: bool,
    /// False for discontinued products
    pub active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when stock has fallen to the reorder threshold
    pub fn needs_restock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

impl Record for Product {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Validated input for `POST /api/products`
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    /// Catalogue code, stored uppercase and unique
    pub code: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Therapeutic or commercial category
    pub category: Option<String>,
    /// Price per unit, rounded to cents
    pub unit_price: f64,
    /// VAT percentage, 0 to 100
    pub vat_rate: f64,
    /// Units on hand
    pub stock: i64,
    /// Reorder threshold
    pub min_stock: i64,
    /// Dispensed only against a prescription
    pub requires_prescription: bool,
    /// False for discontinued products
    pub active: bool,
}

impl Schema for NewProduct {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let code = fields
            .required_str_len("code", 2, 50)
            .map(|c| c.to_uppercase());
        let name = fields.required_str_len("name", 2, 200);
        let description = fields.optional_str_len("description", 1, 2000);
        let category = fields.optional_str_len("category", 1, 100);
        let unit_price = fields.required_f64("unitPrice");
        fields.check_min_f64("unitPrice", unit_price, 0.0);
        let vat_rate = fields.optional_f64("vatRate");
        check_vat_rate(&mut fields, vat_rate);
        let stock = fields.optional_i64("stock");
        fields.check_min_i64("stock", stock, 0);
        let min_stock = fields.optional_i64("minStock");
        fields.check_min_i64("minStock", min_stock, 0);
        let requires_prescription = fields.optional_bool("requiresPrescription");
        let active = fields.optional_bool("active");
        fields.finish()?;

        Ok(Self {
            code: code.unwrap_or_default(),
            name: name.unwrap_or_default(),
            description,
            category,
            unit_price: round_cents(unit_price.unwrap_or_default()),
            vat_rate: vat_rate.unwrap_or(DEFAULT_VAT_RATE),
            stock: stock.unwrap_or(0),
            min_stock: min_stock.unwrap_or(0),
            requires_prescription: requires_prescription.unwrap_or(false),
            active: active.unwrap_or(true),
        })
    }
}

/// Reduced VAT applied to medicines unless a product says otherwise
pub const DEFAULT_VAT_RATE: f64 = 4.0;

fn check_vat_rate(fields: &mut Fields<'_>, vat_rate: Option<f64>) {
    if let Some(rate) = vat_rate {
        fields.ensure(
            (0.0..=100.0).contains(&rate),
            "vatRate",
            "out_of_range",
            "vatRate must be between 0 and 100",
        );
    }
}

/// Validated input for `PUT /api/products/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_prescription: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl Schema for ProductChanges {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let changes = Self {
            code: fields
                .optional_str_len("code", 2, 50)
                .map(|c| c.to_uppercase()),
            name: fields.optional_str_len("name", 2, 200),
            description: fields.optional_str_len("description", 1, 2000),
            category: fields.optional_str_len("category", 1, 100),
            unit_price: fields.optional_f64("unitPrice").map(round_cents),
            vat_rate: fields.optional_f64("vatRate"),
            stock: fields.optional_i64("stock"),
            min_stock: fields.optional_i64("minStock"),
            requires_prescription: fields.optional_bool("requiresPrescription"),
            active: fields.optional_bool("active"),
        };
        fields.check_min_f64("unitPrice", changes.unit_price, 0.0);
        check_vat_rate(&mut fields, changes.vat_rate);
        fields.check_min_i64("stock", changes.stock, 0);
        fields.check_min_i64("minStock", changes.min_stock, 0);
        fields.finish()?;
        Ok(changes)
    }
}

impl MemoryEntity for Product {
    type Create = NewProduct;
    type Update = ProductChanges;
    const ENTITY: &'static str = "Product";

    fn from_create(id: EntityId, data: NewProduct, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: data.code,
            name: data.name,
            description: data.description,
            category: data.category,
            unit_price: data.unit_price,
            vat_rate: data.vat_rate,
            stock: data.stock,
            min_stock: data.min_stock,
            requires_prescription: data.requires_prescription,
            active: data.active,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, data: ProductChanges, now: DateTime<Utc>) {
        if let Some(code) = data.code {
            self.code = code;
        }
        if let Some(name) = data.name {
            self.name = name;
        }
        if data.description.is_some() {
            self.description = data.description;
        }
        if data.category.is_some() {
            self.category = data.category;
        }
        if let Some(price) = data.unit_price {
            self.unit_price = price;
        }
        if let Some(rate) = data.vat_rate {
            self.vat_rate = rate;
        }
        if let Some(stock) = data.stock {
            self.stock = stock;
        }
        if let Some(min_stock) = data.min_stock {
            self.min_stock = min_stock;
        }
        if let Some(flag) = data.requires_prescription {
            self.requires_prescription = flag;
        }
        if let Some(active) = data.active {
            self.active = active;
        }
        self.updated_at = now;
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("code", self.code.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_product_gets_defaults() {
        let product = NewProduct::parse(&json!({
            "code": "par-500",
            "name": "Paracetamol 500mg",
            "unitPrice": "2.456",
        }))
        .unwrap();
        assert_eq!(product.code, "PAR-500");
        assert_eq!(product.unit_price, 2.46);
        assert_eq!(product.vat_rate, DEFAULT_VAT_RATE);
        assert_eq!(product.stock, 0);
        assert!(product.active);
        assert!(!product.requires_prescription);
    }

    #[test]
    fn test_rejects_negative_values() {
        let errors = NewProduct::parse(&json!({
            "code": "IBU-400",
            "name": "Ibuprofeno 400mg",
            "unitPrice": -1,
            "stock": -5,
            "vatRate": 121,
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
                ("unitPrice", "too_small"),
                ("vatRate", "out_of_range"),
                ("stock", "too_small"),
            ]
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let errors = NewProduct::parse(&json!({})).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_update_and_restock_flag() {
        let mut product = Product::from_create(
            7,
            NewProduct::parse(&json!({
                "code": "AMX-1",
                "name": "Amoxicilina",
                "unitPrice": 4.2,
                "stock": 20,
                "minStock": 5,
            }))
            .unwrap(),
            Utc::now(),
        );
        assert!(!product.needs_restock());

        let changes = ProductChanges::parse(&json!({ "stock": 3 })).unwrap();
        product.apply_update(changes, Utc::now());
        assert_eq!(product.stock, 3);
        assert!(product.needs_restock());
        assert_eq!(product.unique_keys(), vec![("code", "AMX-1".to_string())]);
    }
}
