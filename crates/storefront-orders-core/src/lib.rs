//! Core types and lifecycle rules for storefront orders.
//!
//! This crate provides the foundational types used by the order store:
//!
//! - **Identifiers**: `OrderId`, `CustomerId`
//! - **Orders**: `Order`, `OrderItem`, `ProductSnapshot`, `Customer`
//! - **Inputs**: `NewOrder`, `RetryAttempt`, `StatusUpdate`, `PaymentUpdate`
//! - **Lifecycle**: `OrderStatus`, transition and eligibility checks, status display
//! - **Errors**: `OrderError`, the taxonomy returned to callers
//!
//! # Money
//!
//! Prices and totals are stored as `i64` minor units (cents) to avoid floating
//! point drift between the checkout, the sheet and notification emails.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod order;

pub use error::{LifecycleAction, OrderError, Result};
pub use ids::{CustomerId, IdError, OrderId, ORDER_ID_PREFIX};
pub use lifecycle::{
    check_cancel, check_retry, check_transition, display_status, OrderStatus, StatusDisplay,
};
pub use order::{
    Customer, NewOrder, Order, OrderItem, PaymentMethod, PaymentStatus, PaymentUpdate,
    ProductSnapshot, RetryAttempt, ShippingAddress, StatusUpdate,
};
