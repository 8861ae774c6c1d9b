//! Common test utilities for order store integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use storefront_orders_core::{
    Customer, CustomerId, NewOrder, OrderId, OrderItem, OrderStatus, PaymentMethod,
    ProductSnapshot,
};
use storefront_orders_store::schema::order_col;
use storefront_orders_store::{
    AdminDirectory, MailReceipt, Mailer, MailerError, MemorySheets, NotificationDispatcher,
    OrderStore, OutgoingEmail, RateLimiter, RateLimiterConfig, StoreConfig, ORDERS_HEADER,
    ORDERS_SHEET, USERS_SHEET,
};

/// Address that receives copies of new-order emails.
pub const ADMIN_INBOX: &str = "orders@shop.example";

/// Admin recognised by the static fallback list.
pub const FALLBACK_ADMIN: &str = "owner@shop.example";

/// Install a log subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mailer that keeps every email it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    delivered: Notify,
}

impl RecordingMailer {
    /// Emails sent so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` emails were sent.
    pub async fn wait_for(&self, count: usize) -> Vec<OutgoingEmail> {
        loop {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::timeout(Duration::from_secs(5), self.delivered.notified())
                .await
                .expect("timed out waiting for notification");
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<MailReceipt, MailerError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        let message_id = format!("msg-{}", sent.len());
        drop(sent);
        self.delivered.notify_one();
        Ok(MailReceipt { message_id })
    }
}

/// Mailer whose provider is always down.
#[derive(Default)]
pub struct FailingMailer {
    attempts: Mutex<usize>,
    attempted: Notify,
}

impl FailingMailer {
    /// Wait until at least `count` sends were attempted.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            if *self.attempts.lock().unwrap() >= count {
                return;
            }
            tokio::time::timeout(Duration::from_secs(5), self.attempted.notified())
                .await
                .expect("timed out waiting for delivery attempt");
        }
    }
}

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: OutgoingEmail) -> Result<MailReceipt, MailerError> {
        *self.attempts.lock().unwrap() += 1;
        self.attempted.notify_one();
        Err(MailerError::Transport("connection refused".into()))
    }
}

/// Test harness wiring an order store and admin directory to one in-memory spreadsheet.
pub struct TestHarness {
    /// The spreadsheet.
    pub sheets: Arc<MemorySheets>,
    /// The order store under test.
    pub store: OrderStore,
    /// The admin directory under test.
    pub admins: AdminDirectory,
    /// The mailer behind the store's notifier.
    pub mailer: Arc<RecordingMailer>,
}

impl TestHarness {
    /// Create a harness with a recording mailer.
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let mut harness = Self::with_mailer(mailer.clone());
        harness.mailer = mailer;
        harness
    }

    /// Create a harness delivering through `mailer`.
    pub fn with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        init_tracing();
        let config = test_config();
        let sheets = Arc::new(
            MemorySheets::new()
                .with_sheet(ORDERS_SHEET, &ORDERS_HEADER)
                .with_sheet(USERS_SHEET, &["name", "email", "role"]),
        );
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let notifier = NotificationDispatcher::new(mailer)
            .with_admin_address(config.admin_notification_email.clone());
        let store = OrderStore::new(sheets.clone(), limiter.clone(), &config, notifier);
        let admins = AdminDirectory::new(sheets.clone(), limiter, &config);

        Self {
            sheets,
            store,
            admins,
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    /// Create the standard order and return its id.
    pub async fn create_order(&self) -> OrderId {
        self.store.create(new_order()).await.unwrap()
    }

    /// Create an order, then force its stored status as an operator would.
    pub async fn order_in_status(&self, status: OrderStatus) -> OrderId {
        let id = self.create_order().await;
        assert!(self.set_cell(&id, order_col::STATUS, status.as_str()));
        id
    }

    /// Edit a cell of the order's row directly in the sheet.
    pub fn set_cell(&self, id: &OrderId, column: usize, value: &str) -> bool {
        let row_number = self.row_number(id).expect("order row");
        self.sheets.set_cell(ORDERS_SHEET, row_number, column, value)
    }

    /// Raw row of the order.
    pub fn row(&self, id: &OrderId) -> Vec<String> {
        let rows = self.sheets.rows(ORDERS_SHEET);
        let index = self.row_number(id).expect("order row") - 1;
        rows[index].clone()
    }

    /// Number of order rows, header excluded.
    pub fn order_rows(&self) -> usize {
        self.sheets.rows(ORDERS_SHEET).len() - 1
    }

    fn row_number(&self, id: &OrderId) -> Option<usize> {
        self.sheets
            .rows(ORDERS_SHEET)
            .iter()
            .position(|row| row.first().map(String::as_str) == Some(id.as_str()))
            .map(|index| index + 1)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Store configuration without call spacing, so tests run at full speed.
pub fn test_config() -> StoreConfig {
    StoreConfig {
        rate_limit: RateLimiterConfig::concurrency(1),
        fallback_admins: vec![FALLBACK_ADMIN.into()],
        admin_notification_email: Some(ADMIN_INBOX.into()),
        ..StoreConfig::default()
    }
}

/// The purchasing customer.
pub fn customer() -> Customer {
    Customer {
        id: customer_id(),
        name: "Ana Pérez".into(),
        email: "ana@example.com".into(),
    }
}

/// ID of the purchasing customer.
pub fn customer_id() -> CustomerId {
    "cust-1".parse().unwrap()
}

/// One line item.
pub fn item(id: &str, price_cents: i64, quantity: u32) -> OrderItem {
    OrderItem {
        product: ProductSnapshot {
            id: id.into(),
            name: format!("Product {id}"),
            price_cents,
            image: None,
        },
        quantity,
    }
}

/// Two units of `p1` at 100, paid by transfer.
pub fn new_order() -> NewOrder {
    NewOrder {
        customer: Some(customer()),
        items: vec![item("p1", 100, 2)],
        total_cents: Some(200),
        payment_method: Some(PaymentMethod::Transfer),
        ..NewOrder::default()
    }
}
