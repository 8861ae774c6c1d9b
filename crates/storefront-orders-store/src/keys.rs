//! Cache key derivation.
//!
//! Keys are built from a namespace, an operation name and the query
//! parameters. Parameters are rendered as canonical JSON with object keys
//! sorted at every level, so the same query always lands on the same entry no
//! matter how its fields were ordered.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use storefront_orders_core::{CustomerId, OrderId};

/// Cache namespaces.
pub mod ns {
    /// Order lookups.
    pub const ORDERS: &str = "orders";

    /// Administrator directory.
    pub const ADMIN: &str = "admin";
}

/// Cache operation names.
pub mod op {
    /// Single order by id.
    pub const FIND_BY_ID: &str = "findById";

    /// Orders of one customer.
    pub const FIND_BY_CUSTOMER: &str = "findByCustomer";

    /// Every order.
    pub const LIST: &str = "list";

    /// Administrator email set.
    pub const ADMIN_EMAILS: &str = "adminEmails";
}

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace_len: usize,
    rendered: String,
}

impl CacheKey {
    /// Derive a key from a namespace, an operation and JSON parameters.
    #[must_use]
    pub fn new(namespace: &str, operation: &str, params: &Value) -> Self {
        let mut rendered = String::with_capacity(namespace.len() + operation.len() + 16);
        rendered.push_str(namespace);
        rendered.push(':');
        rendered.push_str(operation);
        rendered.push(':');
        write_canonical(params, &mut rendered);
        Self {
            namespace_len: namespace.len(),
            rendered,
        }
    }

    /// Derive a key from any serializable parameter struct.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters cannot be represented as JSON.
    pub fn from_params<P: Serialize>(
        namespace: &str,
        operation: &str,
        params: &P,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(params)?;
        Ok(Self::new(namespace, operation, &value))
    }

    /// The namespace this key belongs to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.rendered[..self.namespace_len]
    }

    /// The full rendered key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Key for a single order lookup.
#[must_use]
pub fn order_by_id(order_id: &OrderId) -> CacheKey {
    CacheKey::new(ns::ORDERS, op::FIND_BY_ID, &json!({ "id": order_id.as_str() }))
}

/// Key for a customer's order history.
#[must_use]
pub fn orders_by_customer(customer_id: &CustomerId) -> CacheKey {
    CacheKey::new(
        ns::ORDERS,
        op::FIND_BY_CUSTOMER,
        &json!({ "customerId": customer_id.as_str() }),
    )
}

/// Key for the full order listing.
#[must_use]
pub fn all_orders() -> CacheKey {
    CacheKey::new(ns::ORDERS, op::LIST, &Value::Null)
}

/// Key for the administrator email set.
#[must_use]
pub fn admin_emails() -> CacheKey {
    CacheKey::new(ns::ADMIN, op::ADMIN_EMAILS, &Value::Null)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct ByStatus<'a> {
        status: &'a str,
        limit: u32,
    }

    #[derive(Serialize)]
    struct ByStatusReordered<'a> {
        limit: u32,
        status: &'a str,
    }

    #[test]
    fn field_order_does_not_change_the_key() {
        let a = CacheKey::from_params(
            "orders",
            "search",
            &ByStatus {
                status: "shipped",
                limit: 10,
            },
        )
        .unwrap();
        let b = CacheKey::from_params(
            "orders",
            "search",
            &ByStatusReordered {
                limit: 10,
                status: "shipped",
            },
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), r#"orders:search:{"limit":10,"status":"shipped"}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let a = CacheKey::new("n", "op", &json!({ "b": { "y": 1, "x": [2, { "q": 1, "p": 0 }] }, "a": null }));
        let b = CacheKey::new("n", "op", &json!({ "a": null, "b": { "x": [2, { "p": 0, "q": 1 }], "y": 1 } }));
        assert_eq!(a, b);
    }

    #[test]
    fn namespace_and_operation_separate_keys() {
        let params = json!({ "id": "ORD-1" });
        assert_ne!(
            CacheKey::new("orders", "findById", &params),
            CacheKey::new("users", "findById", &params)
        );
        assert_ne!(
            CacheKey::new("orders", "findById", &params),
            CacheKey::new("orders", "findByCustomer", &params)
        );
    }

    #[test]
    fn namespace_is_recoverable() {
        let key = order_by_id(&"ORD-7".parse().unwrap());
        assert_eq!(key.namespace(), ns::ORDERS);
        assert_eq!(key.as_str(), r#"orders:findById:{"id":"ORD-7"}"#);
    }
}
