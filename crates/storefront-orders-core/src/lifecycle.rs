//! Order lifecycle state machine.
//!
//! The canonical forward path is
//! `payment_pending → confirmed → processing → shipped → delivered`.
//! `pending` and `pending_transfer` are aliases of the payment stage, and
//! `payment_failed`, `rejected` and `failed` sit beside it. `delivered` and
//! `cancelled` are terminal.
//!
//! Everything here is a pure function of the stored [`Order`]; the order store
//! calls these checks before it writes anything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LifecycleAction, OrderError, Result};
use crate::order::{Order, PaymentMethod};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Legacy alias of `payment_pending`.
    Pending,
    /// Awaiting payment.
    PaymentPending,
    /// Awaiting a manual bank transfer.
    PendingTransfer,
    /// Payment confirmed.
    Confirmed,
    /// Being prepared.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Delivered (terminal).
    Delivered,
    /// Cancelled (terminal).
    Cancelled,
    /// Payment attempt failed.
    PaymentFailed,
    /// Payment rejected by the gateway.
    Rejected,
    /// Checkout failed.
    Failed,
}

impl OrderStatus {
    /// Every status, in canonical order followed by the side states.
    pub const ALL: [Self; 11] = [
        Self::Pending,
        Self::PaymentPending,
        Self::PendingTransfer,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::PaymentFailed,
        Self::Rejected,
        Self::Failed,
    ];

    /// Get the status name as stored in the sheet.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaymentPending => "payment_pending",
            Self::PendingTransfer => "pending_transfer",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::PaymentFailed => "payment_failed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Position on the canonical path, or `None` for failure and cancelled states.
    #[must_use]
    pub const fn stage(self) -> Option<u8> {
        match self {
            Self::Pending | Self::PaymentPending | Self::PendingTransfer => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled | Self::PaymentFailed | Self::Rejected | Self::Failed => None,
        }
    }

    /// Awaiting payment under any of the alias names.
    #[must_use]
    pub const fn is_payment_stage(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::PaymentPending | Self::PendingTransfer
        )
    }

    /// A failed payment or checkout.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::PaymentFailed | Self::Rejected | Self::Failed)
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Cancellation is allowed from this status.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        self.is_payment_stage() || self.is_failure()
    }

    /// `update_for_retry` is allowed from this status.
    #[must_use]
    pub const fn can_retry(self) -> bool {
        self.is_payment_stage() || self.is_failure()
    }

    /// Statuses an admin may move an order to from this one.
    #[must_use]
    pub fn next_statuses(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|&to| to != self && transition_allowed(self, to))
            .collect()
    }

    /// Customer-facing presentation of the status.
    #[must_use]
    pub const fn display(self) -> StatusDisplay {
        let (label, icon, color) = match self {
            Self::Pending | Self::PaymentPending => ("Pending payment", "fas fa-clock", "warning"),
            Self::PendingTransfer => ("Awaiting bank transfer", "fas fa-university", "warning"),
            Self::Confirmed => ("Confirmed", "fas fa-check-circle", "info"),
            Self::Processing => ("Preparing your order", "fas fa-cog", "primary"),
            Self::Shipped => ("Shipped", "fas fa-truck", "primary"),
            Self::Delivered => ("Delivered", "fas fa-box-open", "success"),
            Self::Cancelled => ("Cancelled", "fas fa-times-circle", "secondary"),
            Self::PaymentFailed => ("Payment failed", "fas fa-exclamation-triangle", "danger"),
            Self::Rejected => ("Payment rejected", "fas fa-ban", "danger"),
            Self::Failed => ("Failed", "fas fa-exclamation-circle", "danger"),
        };
        StatusDisplay { label, icon, color }
    }

    // Payment and failure states share the starting position.
    const fn position(self) -> u8 {
        match self.stage() {
            Some(stage) => stage,
            None => 0,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| OrderError::Validation(format!("unknown order status: {s:?}")))
    }
}

/// Label, icon class and color for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    /// Human-readable label.
    pub label: &'static str,
    /// Icon CSS class.
    pub icon: &'static str,
    /// Color token.
    pub color: &'static str,
}

/// Derive the customer-facing status of an order.
///
/// Transfer orders still awaiting payment show as awaiting the transfer,
/// whichever payment-stage alias is stored.
#[must_use]
pub fn display_status(order: &Order) -> StatusDisplay {
    if order.status.is_payment_stage() && order.payment_method == PaymentMethod::Transfer {
        OrderStatus::PendingTransfer.display()
    } else {
        order.status.display()
    }
}

/// Check that `order` may move to `to` through a status update.
///
/// # Errors
///
/// - `OrderError::AlreadyCancelled` when cancelling a cancelled order.
/// - `OrderError::Ineligible` when cancelling past the payment stage.
/// - `OrderError::InvalidTransition` for backward moves or moves out of a
///   terminal status.
pub fn check_transition(order: &Order, to: OrderStatus) -> Result<()> {
    if to == OrderStatus::Cancelled {
        return check_cancel(order);
    }
    if transition_allowed(order.status, to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition {
            from: order.status,
            to,
        })
    }
}

/// Check that `order` may be cancelled.
///
/// # Errors
///
/// Returns `OrderError::AlreadyCancelled` or `OrderError::Ineligible`.
pub fn check_cancel(order: &Order) -> Result<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(OrderError::AlreadyCancelled {
            order_id: order.id.to_string(),
        });
    }
    if order.status.can_cancel() {
        Ok(())
    } else {
        Err(ineligible(order, LifecycleAction::Cancel))
    }
}

/// Check that `order` may be reused for a new checkout attempt.
///
/// # Errors
///
/// Returns `OrderError::Ineligible` once payment is confirmed or the order is terminal.
pub fn check_retry(order: &Order) -> Result<()> {
    if order.status.can_retry() {
        Ok(())
    } else {
        Err(ineligible(order, LifecycleAction::Retry))
    }
}

fn ineligible(order: &Order, action: LifecycleAction) -> OrderError {
    OrderError::Ineligible {
        order_id: order.id.to_string(),
        status: order.status,
        action,
    }
}

fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == OrderStatus::Cancelled {
        return from.can_cancel();
    }
    if from == to {
        return true;
    }
    if to.is_payment_stage() || to.is_failure() {
        // sideways, only before payment is confirmed
        return from.position() == 0;
    }
    to.position() > from.position()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::fixtures::order_with_status;

    const CANONICAL: [OrderStatus; 5] = [
        OrderStatus::PaymentPending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    #[test]
    fn cancellation_eligibility_is_exhaustive() {
        use OrderStatus::*;
        let eligible = [Pending, PaymentPending, PaymentFailed, PendingTransfer, Rejected, Failed];

        for status in OrderStatus::ALL {
            let order = order_with_status(status);
            let result = check_cancel(&order);
            if eligible.contains(&status) {
                assert!(result.is_ok(), "{status} should be cancellable");
            } else if status == Cancelled {
                assert!(matches!(result, Err(OrderError::AlreadyCancelled { .. })));
            } else {
                assert!(
                    matches!(
                        result,
                        Err(OrderError::Ineligible {
                            action: LifecycleAction::Cancel,
                            ..
                        })
                    ),
                    "{status} should not be cancellable"
                );
            }
        }
    }

    #[test]
    fn backward_moves_are_rejected() {
        for (i, from) in CANONICAL.iter().enumerate() {
            for to in &CANONICAL[..i] {
                let order = order_with_status(*from);
                assert!(
                    matches!(
                        check_transition(&order, *to),
                        Err(OrderError::InvalidTransition { .. })
                    ),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn forward_moves_are_allowed_including_skips() {
        let order = order_with_status(OrderStatus::PaymentPending);
        assert!(check_transition(&order, OrderStatus::Confirmed).is_ok());
        assert!(check_transition(&order, OrderStatus::Shipped).is_ok());

        let order = order_with_status(OrderStatus::Shipped);
        assert!(check_transition(&order, OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn failure_states_only_before_confirmation() {
        let order = order_with_status(OrderStatus::PaymentPending);
        assert!(check_transition(&order, OrderStatus::PaymentFailed).is_ok());

        let order = order_with_status(OrderStatus::Rejected);
        assert!(check_transition(&order, OrderStatus::PaymentPending).is_ok());
        assert!(check_transition(&order, OrderStatus::Confirmed).is_ok());

        let order = order_with_status(OrderStatus::Confirmed);
        assert!(check_transition(&order, OrderStatus::PaymentFailed).is_err());
    }

    #[test]
    fn terminal_states_do_not_move() {
        let delivered = order_with_status(OrderStatus::Delivered);
        assert!(delivered.status.next_statuses().is_empty());
        assert!(matches!(
            check_transition(&delivered, OrderStatus::Cancelled),
            Err(OrderError::Ineligible { .. })
        ));

        let cancelled = order_with_status(OrderStatus::Cancelled);
        assert!(matches!(
            check_transition(&cancelled, OrderStatus::Confirmed),
            Err(OrderError::InvalidTransition { .. })
        ));
        assert!(matches!(
            check_transition(&cancelled, OrderStatus::Cancelled),
            Err(OrderError::AlreadyCancelled { .. })
        ));
    }

    #[test]
    fn shipped_accepts_tracking_refresh() {
        let order = order_with_status(OrderStatus::Shipped);
        assert!(check_transition(&order, OrderStatus::Shipped).is_ok());
    }

    #[test]
    fn retry_allowed_only_while_payment_incomplete() {
        for status in OrderStatus::ALL {
            let order = order_with_status(status);
            let expected = status.is_payment_stage() || status.is_failure();
            assert_eq!(check_retry(&order).is_ok(), expected, "{status}");
        }
    }

    #[test]
    fn next_statuses_from_confirmed() {
        assert_eq!(
            OrderStatus::Confirmed.next_statuses(),
            vec![
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered
            ]
        );
    }

    #[test]
    fn parse_is_lenient_about_case_and_separators() {
        assert_eq!(
            "Payment-Pending".parse::<OrderStatus>().unwrap(),
            OrderStatus::PaymentPending
        );
        assert_eq!(
            " SHIPPED ".parse::<OrderStatus>().unwrap(),
            OrderStatus::Shipped
        );
        assert!("enviado".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn every_status_has_a_display() {
        for status in OrderStatus::ALL {
            let display = status.display();
            assert!(!display.label.is_empty());
            assert!(display.icon.starts_with("fas fa-"));
            assert_eq!(display, status.display());
        }
    }

    #[test]
    fn transfer_orders_show_awaiting_transfer() {
        let mut order = order_with_status(OrderStatus::PaymentPending);
        order.payment_method = PaymentMethod::Transfer;
        assert_eq!(display_status(&order).label, "Awaiting bank transfer");

        order.payment_method = PaymentMethod::MercadoPago;
        assert_eq!(display_status(&order).label, "Pending payment");

        order.status = OrderStatus::Shipped;
        order.payment_method = PaymentMethod::Transfer;
        assert_eq!(display_status(&order).label, "Shipped");
    }
}
