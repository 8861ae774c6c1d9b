//! Best-effort order notifications.
//!
//! The dispatcher runs after an order mutation has been written. Delivery
//! happens on a spawned task; failures are logged and dropped, never returned
//! to the caller that made the mutation.

use std::fmt;
use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use storefront_orders_core::{display_status, Order, OrderStatus};

use crate::rows::format_cents;

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// Acknowledgement from the mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailReceipt {
    /// Provider message ID.
    pub message_id: String,
}

/// Errors that can occur when sending an email.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider refused the message.
    #[error("mail provider rejected message: {status} - {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Outbound email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider could not accept the message.
    async fn send(&self, email: OutgoingEmail) -> Result<MailReceipt, MailerError>;
}

/// Order events that trigger notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    /// A new order was written.
    Created,
    /// An order moved to a new status.
    StatusChanged {
        /// Status before the change.
        previous: OrderStatus,
    },
    /// An order was cancelled.
    Cancelled,
}

impl OrderEvent {
    /// Event name as used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "orderCreated",
            Self::StatusChanged { .. } => "orderStatusChanged",
            Self::Cancelled => "orderCancelled",
        }
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A notification that could not be delivered.
#[derive(Debug, thiserror::Error)]
#[error("{event} notification for order {order_id} to {recipient} failed")]
pub struct NotificationError {
    /// Event being notified.
    pub event: OrderEvent,
    /// Order the event concerns.
    pub order_id: String,
    /// Intended recipient.
    pub recipient: String,
    /// Underlying mailer failure.
    #[source]
    pub source: MailerError,
}

/// Sends order emails without blocking or failing the order write path.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    mailer: Option<Arc<dyn Mailer>>,
    admin_address: Option<String>,
}

impl NotificationDispatcher {
    /// Create a dispatcher delivering through `mailer`.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer: Some(mailer),
            admin_address: None,
        }
    }

    /// Create a dispatcher that sends nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Copy new-order notifications to `address`.
    #[must_use]
    pub fn with_admin_address(mut self, address: Option<String>) -> Self {
        self.admin_address = address.filter(|a| !a.trim().is_empty());
        self
    }

    /// Whether a mailer is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Render the emails for `event`.
    ///
    /// The customer is always notified; the admin address, when set, only
    /// hears about new orders.
    ///
    /// # Errors
    ///
    /// Returns [`MailerError::Template`] if a body fails to render.
    pub fn compose(
        &self,
        event: OrderEvent,
        order: &Order,
    ) -> Result<Vec<OutgoingEmail>, MailerError> {
        let mut emails = vec![customer_email(event, order)?];
        if let (OrderEvent::Created, Some(admin)) = (event, &self.admin_address) {
            emails.push(admin_email(admin, order)?);
        }
        Ok(emails)
    }

    /// Deliver the emails for `event` in the background.
    ///
    /// Returns the delivery task, or `None` when nothing was scheduled
    /// (dispatcher disabled, no runtime, or a body failed to render).
    pub fn dispatch(&self, event: OrderEvent, order: &Order) -> Option<JoinHandle<()>> {
        let mailer = Arc::clone(self.mailer.as_ref()?);
        let order_id = order.id.to_string();
        let emails = match self.compose(event, order) {
            Ok(emails) => emails,
            Err(e) => {
                warn!(
                    event = %event,
                    order_id = %order_id,
                    error = %e,
                    "notification not rendered"
                );
                return None;
            }
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(event = %event, order_id = %order_id, "no async runtime, notification dropped");
            return None;
        };
        Some(runtime.spawn(async move {
            for email in emails {
                match deliver(mailer.as_ref(), event, &order_id, email).await {
                    Ok(receipt) => {
                        info!(
                            event = %event,
                            order_id = %order_id,
                            message_id = %receipt.message_id,
                            "notification sent"
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, cause = %e.source, "notification dropped");
                    }
                }
            }
        }))
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("enabled", &self.is_enabled())
            .field("admin_address", &self.admin_address)
            .finish()
    }
}

async fn deliver(
    mailer: &dyn Mailer,
    event: OrderEvent,
    order_id: &str,
    email: OutgoingEmail,
) -> Result<MailReceipt, NotificationError> {
    let recipient = email.to.clone();
    debug!(event = %event, order_id = %order_id, to = %recipient, "sending notification");
    mailer
        .send(email)
        .await
        .map_err(|source| NotificationError {
            event,
            order_id: order_id.to_string(),
            recipient,
            source,
        })
}

/// One item line in the order summary.
struct SummaryLine<'a> {
    quantity: u32,
    name: &'a str,
    subtotal: String,
}

/// HTML template for the customer's order email.
#[derive(Template)]
#[template(path = "email/customer_order.html")]
struct CustomerOrderEmailHtml<'a> {
    name: &'a str,
    lead: &'a str,
    tracking: Option<&'a str>,
    lines: &'a [SummaryLine<'a>],
    total: &'a str,
}

/// HTML template for the new-order copy sent to the shop.
#[derive(Template)]
#[template(path = "email/admin_order.html")]
struct AdminOrderEmailHtml<'a> {
    order_id: &'a str,
    name: &'a str,
    email: &'a str,
    payment_method: &'a str,
    lines: &'a [SummaryLine<'a>],
    total: &'a str,
}

fn summary_lines(order: &Order) -> Vec<SummaryLine<'_>> {
    order
        .items
        .iter()
        .map(|item| SummaryLine {
            quantity: item.quantity,
            name: &item.product.name,
            subtotal: format_cents(item.subtotal_cents()),
        })
        .collect()
}

fn customer_email(event: OrderEvent, order: &Order) -> Result<OutgoingEmail, askama::Error> {
    let id = &order.id;
    let status = display_status(order).label;
    let (subject, lead) = match event {
        OrderEvent::Created => (
            format!("Order {id} received"),
            "Thanks for your purchase. We received your order.".to_string(),
        ),
        OrderEvent::StatusChanged { .. } => (
            format!("Order {id}: {status}"),
            format!("Your order is now: {status}."),
        ),
        OrderEvent::Cancelled => (
            format!("Order {id} cancelled"),
            match &order.cancellation_reason {
                Some(reason) => format!("Your order was cancelled. Reason: {reason}."),
                None => "Your order was cancelled.".to_string(),
            },
        ),
    };

    let lines = summary_lines(order);
    let html = CustomerOrderEmailHtml {
        name: &order.customer.name,
        lead: &lead,
        tracking: order.tracking_number.as_deref(),
        lines: &lines,
        total: &format_cents(order.total_cents),
    }
    .render()?;
    Ok(OutgoingEmail {
        to: order.customer.email.clone(),
        subject,
        html,
    })
}

fn admin_email(admin: &str, order: &Order) -> Result<OutgoingEmail, askama::Error> {
    let lines = summary_lines(order);
    let html = AdminOrderEmailHtml {
        order_id: order.id.as_str(),
        name: &order.customer.name,
        email: &order.customer.email,
        payment_method: order.payment_method.as_str(),
        lines: &lines,
        total: &format_cents(order.total_cents),
    }
    .render()?;
    Ok(OutgoingEmail {
        to: admin.to_string(),
        subject: format!("New order {}", order.id),
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use storefront_orders_core::{
        Customer, NewOrder, OrderId, OrderItem, PaymentMethod, ProductSnapshot,
    };

    #[derive(Default)]
    struct Outbox(Mutex<Vec<OutgoingEmail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, email: OutgoingEmail) -> Result<MailReceipt, MailerError> {
            self.0.lock().unwrap().push(email);
            Ok(MailReceipt {
                message_id: "msg-1".into(),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl Mailer for Down {
        async fn send(&self, _email: OutgoingEmail) -> Result<MailReceipt, MailerError> {
            Err(MailerError::Transport("connection refused".into()))
        }
    }

    fn order() -> Order {
        let new = NewOrder {
            customer: Some(Customer {
                id: "cust-1".parse().unwrap(),
                name: "Ana <script>".into(),
                email: "ana@example.com".into(),
            }),
            items: vec![OrderItem {
                product: ProductSnapshot {
                    id: "p1".into(),
                    name: "Mate & bombilla".into(),
                    price_cents: 100,
                    image: None,
                },
                quantity: 2,
            }],
            total_cents: Some(200),
            payment_method: Some(PaymentMethod::Transfer),
            ..NewOrder::default()
        };
        Order::from_new(new, OrderId::generate(), Utc::now()).unwrap()
    }

    #[test]
    fn test_created_copies_admin() {
        let dispatcher = NotificationDispatcher::new(Arc::new(Outbox::default()))
            .with_admin_address(Some("orders@shop.com".into()));
        let emails = dispatcher.compose(OrderEvent::Created, &order()).unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].to, "ana@example.com");
        assert_eq!(emails[1].to, "orders@shop.com");

        let emails = dispatcher.compose(OrderEvent::Cancelled, &order()).unwrap();
        assert_eq!(emails.len(), 1);
    }

    #[test]
    fn test_bodies_are_escaped() {
        let emails = NotificationDispatcher::disabled()
            .compose(OrderEvent::Created, &order())
            .unwrap();
        let html = &emails[0].html;
        assert!(html.contains("Ana &lt;script&gt;"));
        assert!(html.contains("Mate &amp; bombilla"));
        assert!(html.contains("Total: 2.00"));
    }

    #[test]
    fn test_status_subject_uses_display_label() {
        let mut order = order();
        order.status = OrderStatus::Shipped;
        order.tracking_number = Some("TRK<1>".into());
        let emails = NotificationDispatcher::disabled()
            .compose(
                OrderEvent::StatusChanged {
                    previous: OrderStatus::Processing,
                },
                &order,
            )
            .unwrap();
        assert!(emails[0].subject.ends_with(": Shipped"));
        assert!(emails[0].html.contains("Tracking number: TRK&lt;1&gt;"));
    }

    #[test]
    fn test_admin_copy_escapes_customer_fields() {
        let dispatcher = NotificationDispatcher::disabled()
            .with_admin_address(Some("orders@shop.com".into()));
        let emails = dispatcher.compose(OrderEvent::Created, &order()).unwrap();
        let html = &emails[1].html;
        assert!(html.contains("from Ana &lt;script&gt; &lt;ana@example.com&gt;"));
        assert!(html.contains("2 x Mate &amp; bombilla (2.00)"));
        assert!(!html.contains("<script>"));
        assert!(!emails[0].html.contains("Tracking number"));
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let outbox = Arc::new(Outbox::default());
        let dispatcher = NotificationDispatcher::new(outbox.clone());
        let handle = dispatcher.dispatch(OrderEvent::Created, &order()).unwrap();
        handle.await.unwrap();
        assert_eq!(outbox.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_swallowed() {
        let dispatcher = NotificationDispatcher::new(Arc::new(Down));
        let handle = dispatcher.dispatch(OrderEvent::Cancelled, &order()).unwrap();
        assert!(handle.await.is_ok());
    }

    #[test]
    fn test_disabled_and_runtime_less_dispatch_schedule_nothing() {
        assert!(NotificationDispatcher::disabled()
            .dispatch(OrderEvent::Created, &order())
            .is_none());
        let dispatcher = NotificationDispatcher::new(Arc::new(Outbox::default()));
        assert!(dispatcher.dispatch(OrderEvent::Created, &order()).is_none());
    }
}
