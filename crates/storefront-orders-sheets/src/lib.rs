//! Google Sheets and mail relay adapters for the storefront order store.
//!
//! [`SheetsClient`] implements [`storefront_orders_store::SheetsGateway`] over
//! the Sheets v4 values API, authenticating with a service account
//! ([`TokenProvider`]) or a pre-issued access token. [`RelayMailer`]
//! implements [`storefront_orders_store::Mailer`] over an HTTP mail relay.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_orders_sheets::{MailerConfig, RelayMailer, SheetsClient, SheetsConfig};
//! use storefront_orders_store::{
//!     AdminDirectory, NotificationDispatcher, OrderStore, RateLimiter, StoreConfig,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::from_env();
//! let sheets = Arc::new(SheetsClient::new(SheetsConfig::from_env()?)?);
//! let limiter = Arc::new(RateLimiter::new(config.rate_limit));
//!
//! let notifier = match MailerConfig::from_env() {
//!     Some(mail) => NotificationDispatcher::new(Arc::new(RelayMailer::new(mail)?))
//!         .with_admin_address(config.admin_notification_email.clone()),
//!     None => NotificationDispatcher::disabled(),
//! };
//!
//! let admins = AdminDirectory::new(sheets.clone(), limiter.clone(), &config);
//! let store = OrderStore::new(sheets, limiter, &config, notifier);
//! store.ensure_schema().await?;
//!
//! if admins.is_admin("ana@example.com").await {
//!     let orders = store.list_orders().await?;
//!     println!("{} orders", orders.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod client;
pub mod config;
pub mod mailer;

pub use auth::TokenProvider;
pub use client::SheetsClient;
pub use config::{ConfigError, Credentials, MailerConfig, ServiceAccountKey, SheetsConfig};
pub use mailer::RelayMailer;
