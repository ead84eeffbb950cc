//! Business records served by the API
//!
//! Each record comes with its create/update inputs (validated through
//! [`Schema`](crate::validation::Schema)) and a
//! [`MemoryEntity`](crate::storage::MemoryEntity) impl, so a resource is
//! wired up with nothing more than a [`ResourceDescriptor`](crate::controller::ResourceDescriptor).

mod customer;
mod order;
mod product;

pub use customer::{Customer, CustomerChanges, NewCustomer};
pub use order::{NewOrder, Order, OrderChanges, OrderLine, OrderStatus};
pub use product::{NewProduct, Product, ProductChanges};

use crate::validation::Fields;

/// Fields matched by `?search=` on `/api/customers`
pub const CUSTOMER_SEARCH_FIELDS: &[&str] = &["name", "taxId", "email", "city"];

/// Fields matched by `?search=` on `/api/products`
pub const PRODUCT_SEARCH_FIELDS: &[&str] = &["code", "name", "category", "description"];

/// Fields matched by `?search=` on `/api/orders`
pub const ORDER_SEARCH_FIELDS: &[&str] = &["reference", "status", "notes"];

pub(crate) fn check_email(fields: &mut Fields<'_>, name: &str, email: Option<&str>) {
    let Some(email) = email else { return };
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        })
        && !email.contains(char::is_whitespace);
    fields.ensure(valid, name, "invalid_email", format!("{name} must be a valid email address"));
}

pub(crate) fn check_tax_id(fields: &mut Fields<'_>, name: &str, tax_id: Option<&str>) {
    let Some(tax_id) = tax_id else { return };
    let valid = tax_id.len() == 9 && tax_id.chars().all(|c| c.is_ascii_alphanumeric());
    fields.ensure(
        valid,
        name,
        "invalid_tax_id",
        format!("{name} must be 9 letters or digits"),
    );
}

/// Round a currency amount to cents
pub(crate) fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_email_check() {
        let input = json!({});
        for (email, ok) in [
            ("compras@farmacia.es", true),
            ("a@b.co", true),
            ("no-at-sign", false),
            ("@farmacia.es", false),
            ("compras@localhost", false),
            ("com pras@farmacia.es", false),
        ] {
            let mut fields = Fields::new(&input);
            check_email(&mut fields, "email", Some(email));
            assert_eq!(fields.finish().is_ok(), ok, "{email}");
        }
    }

    #[test]
    fn test_tax_id_check() {
        let input = json!({});
        let mut fields = Fields::new(&input);
        check_tax_id(&mut fields, "taxId", Some("B1234567"));
        let errors = fields.finish().unwrap_err();
        assert_eq!(errors.violations()[0].code, "invalid_tax_id");
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.005_1), 10.01);
        assert_eq!(round_cents(3.0 * 1.1), 3.3);
    }
}
