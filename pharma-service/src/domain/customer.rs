//! Customers (pharmacies, clinics, wholesalers)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_email, check_tax_id};
use crate::storage::{EntityId, MemoryEntity, Record};
use crate::validation::{Fields, Schema, ValidationErrors};

/// A customer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Storage-assigned id
    pub id: EntityId,
    /// Legal or trading name
    pub name: String,
    /// Tax identification number (NIF/CIF), uppercase and unique
    pub tax_id: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// False for customers no longer served
    pub active: bool,
    /// Internal notes
    pub notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Record for Customer {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Validated input for `POST /api/customers`
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    /// Legal or trading name
    pub name: String,
    /// Tax identification number (NIF/CIF), uppercase and unique
    pub tax_id: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// False for customers no longer served
    pub active: bool,
    /// Internal notes
    pub notes: Option<String>,
}

impl Schema for NewCustomer {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let name = fields.required_str_len("name", 2, 150);
        let tax_id = fields.optional_str("taxId").map(|v| v.to_uppercase());
        check_tax_id(&mut fields, "taxId", tax_id.as_deref());
        let email = fields.optional_str_len("email", 3, 254);
        check_email(&mut fields, "email", email.as_deref());
        let phone = fields.optional_str_len("phone", 6, 20);
        let address = fields.optional_str_len("address", 1, 250);
        let city = fields.optional_str_len("city", 1, 100);
        let postal_code = fields.optional_str_len("postalCode", 3, 10);
        let active = fields.optional_bool("active").unwrap_or(true);
        let notes = fields.optional_str_len("notes", 1, 1000);
        fields.finish()?;

        Ok(Self {
            name: name.unwrap_or_default(),
            tax_id,
            email,
            phone,
            address,
            city,
            postal_code,
            active,
            notes,
        })
    }
}

/// Validated input for `PUT /api/customers/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Schema for CustomerChanges {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let changes = Self {
            name: fields.optional_str_len("name", 2, 150),
            tax_id: fields.optional_str("taxId").map(|v| v.to_uppercase()),
            email: fields.optional_str_len("email", 3, 254),
            phone: fields.optional_str_len("phone", 6, 20),
            address: fields.optional_str_len("address", 1, 250),
            city: fields.optional_str_len("city", 1, 100),
            postal_code: fields.optional_str_len("postalCode", 3, 10),
            active: fields.optional_bool("active"),
            notes: fields.optional_str_len("notes", 1, 1000),
        };
        check_tax_id(&mut fields, "taxId", changes.tax_id.as_deref());
        check_email(&mut fields, "email", changes.email.as_deref());
        fields.finish()?;
        Ok(changes)
    }
}

impl MemoryEntity for Customer {
    type Create = NewCustomer;
    type Update = CustomerChanges;
    const ENTITY: &'static str = "Customer";

    fn from_create(id: EntityId, data: NewCustomer, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: data.name,
            tax_id: data.tax_id,
            email: data.email,
            phone: data.phone,
            address: data.address,
            city: data.city,
            postal_code: data.postal_code,
            active: data.active,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, data: CustomerChanges, now: DateTime<Utc>) {
        if let Some(name) = data.name {
            self.name = name;
        }
        if data.tax_id.is_some() {
            self.tax_id = data.tax_id;
        }
        if data.email.is_some() {
            self.email = data.email;
        }
        if data.phone.is_some() {
            self.phone = data.phone;
        }
        if data.address.is_some() {
            self.address = data.address;
        }
        if data.city.is_some() {
            self.city = data.city;
        }
        if data.postal_code.is_some() {
            self.postal_code = data.postal_code;
        }
        if let Some(active) = data.active {
            self.active = active;
        }
        if data.notes.is_some() {
            self.notes = data.notes;
        }
        self.updated_at = now;
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        self.tax_id
            .iter()
            .map(|tax_id| ("taxId", tax_id.clone()))
            .collect()
    }
}
