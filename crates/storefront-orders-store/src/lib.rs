//! Spreadsheet-backed order store for the storefront.
//!
//! This crate treats a shared, rate-limited spreadsheet as the order database.
//!
//! # Architecture
//!
//! - [`KeyedCache`]: TTL cache keyed by namespace, operation and parameters
//! - [`RateLimiter`]: every spreadsheet call runs through it
//! - [`SheetsGateway`]: row-level access to the spreadsheet; [`MemorySheets`]
//!   is the in-process implementation
//! - [`OrderStore`]: create, find, retry, cancel and status updates over the
//!   Orders sheet
//! - [`AdminDirectory`]: administrator lookup over the Users sheet, with a
//!   static fallback list
//! - [`NotificationDispatcher`]: best-effort emails through a [`Mailer`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_orders_core::{Customer, NewOrder, OrderItem, PaymentMethod, ProductSnapshot};
//! use storefront_orders_store::{
//!     MemorySheets, NotificationDispatcher, OrderStore, RateLimiter, StoreConfig, ORDERS_SHEET,
//!     ORDERS_HEADER,
//! };
//!
//! # async fn run() -> storefront_orders_core::Result<()> {
//! let config = StoreConfig::default();
//! let sheets = Arc::new(MemorySheets::new().with_sheet(ORDERS_SHEET, &ORDERS_HEADER));
//! let limiter = Arc::new(RateLimiter::new(config.rate_limit));
//! let store = OrderStore::new(sheets, limiter, &config, NotificationDispatcher::disabled());
//!
//! let id = store
//!     .create(NewOrder {
//!         customer: Some(Customer {
//!             id: "cust-1".parse()?,
//!             name: "Ana".into(),
//!             email: "ana@example.com".into(),
//!         }),
//!         items: vec![OrderItem {
//!             product: ProductSnapshot {
//!                 id: "p1".into(),
//!                 name: "Mate".into(),
//!                 price_cents: 100,
//!                 image: None,
//!             },
//!             quantity: 2,
//!         }],
//!         total_cents: Some(200),
//!         payment_method: Some(PaymentMethod::Transfer),
//!         ..NewOrder::default()
//!     })
//!     .await?;
//! let order = store.find_by_id(&id).await?;
//! assert_eq!(order.id, id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod limiter;
pub mod memory;
pub mod notify;
pub mod orders;
pub mod rows;
pub mod schema;

pub use admin::{AdminDirectory, AdminSet};
pub use cache::KeyedCache;
pub use config::{StoreConfig, DEFAULT_ADMIN_EMAILS};
pub use error::{GatewayError, Result};
pub use gateway::{Row, SheetsGateway};
pub use keys::CacheKey;
pub use limiter::{RateLimiter, RateLimiterConfig};
pub use memory::MemorySheets;
pub use notify::{
    MailReceipt, Mailer, MailerError, NotificationDispatcher, NotificationError, OrderEvent,
    OutgoingEmail,
};
pub use orders::OrderStore;
pub use schema::{ADMIN_ROLE, ORDERS_HEADER, ORDERS_SHEET, USERS_SHEET};
