//! Order types for storefront orders.
//!
//! An [`Order`] is created once per checkout attempt and then only mutated
//! through the `apply_*` methods, each of which stamps `updated_at`. Orders are
//! never deleted; cancellation is a status change.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};
use crate::ids::{CustomerId, OrderId};
use crate::lifecycle::OrderStatus;

/// Identity of the purchaser. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer ID from the authentication layer.
    pub id: CustomerId,
    /// Display name.
    pub name: String,
    /// Contact email, also the notification recipient.
    pub email: String,
}

/// Copy of the product as it was when the order was placed.
///
/// Snapshots are never refreshed from the catalog, so historical orders render
/// identically after catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Catalog product ID.
    pub id: String,
    /// Product name at order time.
    #[serde(default)]
    pub name: String,
    /// Unit price in minor currency units.
    pub price_cents: i64,
    /// Image URL at order time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product snapshot.
    pub product: ProductSnapshot,
    /// Units ordered.
    pub quantity: u32,
}

impl OrderItem {
    /// Price times quantity, in minor units.
    #[must_use]
    pub fn subtotal_cents(&self) -> i64 {
        self.product
            .price_cents
            .saturating_mul(i64::from(self.quantity))
    }
}

/// How the customer pays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    /// Manual bank transfer.
    Transfer,
    /// `MercadoPago` checkout.
    MercadoPago,
    /// Cash on pickup or delivery.
    Cash,
    /// Any other method, stored verbatim.
    Other(String),
}

impl PaymentMethod {
    /// Get the method name as stored in the sheet.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Transfer => "transfer",
            Self::MercadoPago => "mercadopago",
            Self::Cash => "cash",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for PaymentMethod {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "transfer" | "bank_transfer" | "transferencia" => Self::Transfer,
            "mercadopago" | "mercado_pago" => Self::MercadoPago,
            "cash" | "efectivo" => Self::Cash,
            _ => Self::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting payment.
    Pending,
    /// Payment approved.
    Approved,
    /// Payment rejected.
    Rejected,
    /// Payment cancelled.
    Cancelled,
}

impl PaymentStatus {
    /// Get the status name as stored in the sheet.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Order status implied by this payment outcome, if any.
    #[must_use]
    pub const fn implied_order_status(self) -> Option<OrderStatus> {
        match self {
            Self::Pending => None,
            Self::Approved => Some(OrderStatus::Confirmed),
            Self::Rejected | Self::Cancelled => Some(OrderStatus::PaymentFailed),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "in_process" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(OrderError::Validation(format!(
                "unknown payment status: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Person receiving the parcel.
    #[serde(default)]
    pub recipient: String,
    /// Street and number.
    #[serde(default)]
    pub street: String,
    /// City.
    #[serde(default)]
    pub city: String,
    /// Province or state.
    #[serde(default)]
    pub province: String,
    /// Postal code.
    #[serde(default)]
    pub postal_code: String,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A storefront order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,

    /// Purchaser identity.
    pub customer: Customer,

    /// Line items with product snapshots.
    pub items: Vec<OrderItem>,

    /// Total in minor units; equals the item subtotals at creation and is not
    /// recomputed afterwards.
    pub total_cents: i64,

    /// Lifecycle status.
    pub status: OrderStatus,

    /// Payment method of the latest checkout attempt.
    pub payment_method: PaymentMethod,

    /// Payment gateway reference, if one has been attached.
    pub payment_id: Option<String>,

    /// Payment gateway status.
    pub payment_status: Option<PaymentStatus>,

    /// Delivery details.
    pub shipping_address: Option<ShippingAddress>,

    /// Carrier tracking number, set once shipped.
    pub tracking_number: Option<String>,

    /// Estimated delivery date, set once shipped.
    pub estimated_delivery: Option<NaiveDate>,

    /// Free-text notes.
    pub notes: String,

    /// Reason recorded on cancellation.
    pub cancellation_reason: Option<String>,

    /// Email of whoever cancelled the order.
    pub cancelled_by: Option<String>,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new order from checkout input.
    ///
    /// New orders start in `payment_pending` with a pending payment status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` if a required field is missing, an
    /// item is malformed, or the total does not match the item subtotals.
    pub fn from_new(new: NewOrder, id: OrderId, now: DateTime<Utc>) -> Result<Self> {
        let mut missing = Vec::new();
        if new.customer.is_none() {
            missing.push("customer");
        }
        if new.items.is_empty() {
            missing.push("items");
        }
        if new.total_cents.is_none() {
            missing.push("total");
        }
        if new.payment_method.is_none() {
            missing.push("paymentMethod");
        }
        let (Some(customer), Some(total_cents), Some(payment_method), false) = (
            new.customer,
            new.total_cents,
            new.payment_method,
            new.items.is_empty(),
        ) else {
            return Err(OrderError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        };

        if !customer.email.contains('@') {
            return Err(OrderError::Validation(format!(
                "invalid customer email: {:?}",
                customer.email
            )));
        }
        validate_items(&new.items)?;
        validate_total(total_cents, &new.items)?;

        Ok(Self {
            id,
            customer,
            items: new.items,
            total_cents,
            status: OrderStatus::PaymentPending,
            payment_method,
            payment_id: None,
            payment_status: Some(PaymentStatus::Pending),
            shipping_address: new.shipping_address,
            tracking_number: None,
            estimated_delivery: None,
            notes: new.notes,
            cancellation_reason: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check whether the order belongs to the given customer.
    #[must_use]
    pub fn belongs_to(&self, customer_id: &CustomerId) -> bool {
        &self.customer.id == customer_id
    }

    /// Sum of the item subtotals.
    #[must_use]
    pub fn items_total_cents(&self) -> i64 {
        items_total(&self.items)
    }

    /// Overwrite the payment fields with a new checkout attempt.
    ///
    /// Leaves the order in `payment_pending` with a pending payment status.
    /// The attempt must already have passed [`RetryAttempt::validate`].
    pub fn apply_retry(&mut self, attempt: RetryAttempt, now: DateTime<Utc>) {
        if let Some(items) = attempt.items {
            self.total_cents = attempt.total_cents.unwrap_or_else(|| items_total(&items));
            self.items = items;
        } else if let Some(total) = attempt.total_cents {
            self.total_cents = total;
        }
        if let Some(address) = attempt.shipping_address {
            self.shipping_address = Some(address);
        }
        self.payment_method = attempt.payment_method;
        self.payment_id = attempt.payment_id;
        self.payment_status = Some(PaymentStatus::Pending);
        self.status = OrderStatus::PaymentPending;
        self.updated_at = now;
    }

    /// Mark the order cancelled.
    pub fn apply_cancel(&mut self, reason: &str, actor_email: &str, now: DateTime<Utc>) {
        self.status = OrderStatus::Cancelled;
        self.cancellation_reason = Some(reason.to_string());
        self.cancelled_by = Some(actor_email.to_string());
        if self.payment_status == Some(PaymentStatus::Pending) {
            self.payment_status = Some(PaymentStatus::Cancelled);
        }
        self.updated_at = now;
    }

    /// Move to `status`, merging the update fields relevant to it.
    ///
    /// Tracking number and estimated delivery are only merged for `shipped`
    /// and `delivered`.
    pub fn apply_status(&mut self, status: OrderStatus, update: StatusUpdate, now: DateTime<Utc>) {
        if matches!(status, OrderStatus::Shipped | OrderStatus::Delivered) {
            if let Some(tracking) = update.tracking_number {
                self.tracking_number = Some(tracking);
            }
            if let Some(date) = update.estimated_delivery {
                self.estimated_delivery = Some(date);
            }
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Record a payment gateway outcome, moving to `status` when given.
    pub fn apply_payment(
        &mut self,
        payment: &PaymentUpdate,
        status: Option<OrderStatus>,
        now: DateTime<Utc>,
    ) {
        self.payment_id = Some(payment.payment_id.clone());
        self.payment_status = Some(payment.payment_status);
        if let Some(status) = status {
            self.status = status;
        }
        self.updated_at = now;
    }

    /// Whether the payment update is already reflected in this order.
    #[must_use]
    pub fn has_payment(&self, payment: &PaymentUpdate) -> bool {
        self.payment_id.as_deref() == Some(payment.payment_id.as_str())
            && self.payment_status == Some(payment.payment_status)
    }
}

/// Checkout input for [`Order::from_new`].
///
/// Required fields are optional here so that missing input is reported as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Client-proposed order ID, honored only if unused.
    #[serde(default)]
    pub id: Option<OrderId>,
    /// Purchaser.
    #[serde(default)]
    pub customer: Option<Customer>,
    /// Line items.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Total in minor units.
    #[serde(default)]
    pub total_cents: Option<i64>,
    /// Payment method.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Delivery details.
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
}

/// A customer restarting checkout for an existing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAttempt {
    /// Identity of the requesting customer; must own the order.
    pub customer_id: CustomerId,
    /// Payment method for this attempt.
    pub payment_method: PaymentMethod,
    /// New total, if it changed.
    #[serde(default)]
    pub total_cents: Option<i64>,
    /// New items, if the cart changed.
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    /// New delivery details, if they changed.
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    /// Payment reference for this attempt, if already created.
    #[serde(default)]
    pub payment_id: Option<String>,
}

impl RetryAttempt {
    /// Create an attempt that only changes the payment method.
    #[must_use]
    pub fn new(customer_id: CustomerId, payment_method: PaymentMethod) -> Self {
        Self {
            customer_id,
            payment_method,
            total_cents: None,
            items: None,
            shipping_address: None,
            payment_id: None,
        }
    }

    /// Set the new total.
    #[must_use]
    pub fn with_total_cents(mut self, total_cents: i64) -> Self {
        self.total_cents = Some(total_cents);
        self
    }

    /// Set the new items.
    #[must_use]
    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.items = Some(items);
        self
    }

    /// Set the new delivery details.
    #[must_use]
    pub fn with_shipping_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = Some(address);
        self
    }

    /// Validate the attempt before any lookup or write.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for negative totals, malformed items,
    /// or a total that disagrees with the supplied items.
    pub fn validate(&self) -> Result<()> {
        if let Some(total) = self.total_cents {
            if total < 0 {
                return Err(OrderError::Validation(format!(
                    "total must not be negative: {total}"
                )));
            }
        }
        if let Some(items) = &self.items {
            if items.is_empty() {
                return Err(OrderError::Validation("items must not be empty".into()));
            }
            validate_items(items)?;
            if let Some(total) = self.total_cents {
                validate_total(total, items)?;
            }
        }
        Ok(())
    }
}

/// Optional fields merged by a status update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Carrier tracking number.
    #[serde(default)]
    pub tracking_number: Option<String>,
    /// Estimated delivery date.
    #[serde(default)]
    pub estimated_delivery: Option<NaiveDate>,
    /// Replacement notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payment outcome parsed from a gateway notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    /// Gateway payment reference.
    pub payment_id: String,
    /// Gateway status.
    pub payment_status: PaymentStatus,
}

fn items_total(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .fold(0_i64, |acc, item| acc.saturating_add(item.subtotal_cents()))
}

fn validate_items(items: &[OrderItem]) -> Result<()> {
    for item in items {
        if item.product.id.trim().is_empty() {
            return Err(OrderError::Validation("item is missing a product id".into()));
        }
        if item.quantity == 0 {
            return Err(OrderError::Validation(format!(
                "quantity must be positive for product {}",
                item.product.id
            )));
        }
        if item.product.price_cents < 0 {
            return Err(OrderError::Validation(format!(
                "price must not be negative for product {}",
                item.product.id
            )));
        }
    }
    Ok(())
}

fn validate_total(total_cents: i64, items: &[OrderItem]) -> Result<()> {
    let expected = items_total(items);
    if total_cents == expected {
        Ok(())
    } else {
        Err(OrderError::Validation(format!(
            "total {total_cents} does not match item subtotals {expected}"
        )))
    }
}
