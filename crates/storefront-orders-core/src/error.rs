//! Error types for storefront orders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::IdError;
use crate::lifecycle::OrderStatus;

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Lifecycle operation that an order can become ineligible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Customer or admin cancellation.
    Cancel,
    /// Restarting checkout on an existing order.
    Retry,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cancel => "cancelled",
            Self::Retry => "retried",
        })
    }
}

/// Errors returned by order operations.
///
/// Validation and lifecycle errors are raised before any external write is
/// attempted. `Persistence` means the spreadsheet call itself failed and the
/// caller decides whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Malformed or missing input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The order does not exist or does not belong to the requesting customer.
    #[error("order not found: {order_id}")]
    NotFound {
        /// The order ID that was looked up.
        order_id: String,
    },

    /// The requested status change is not allowed by the lifecycle.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The stored status.
        from: OrderStatus,
        /// The requested status.
        to: OrderStatus,
    },

    /// The order was already cancelled.
    #[error("order {order_id} is already cancelled")]
    AlreadyCancelled {
        /// The order ID.
        order_id: String,
    },

    /// The order's current status does not allow the operation.
    #[error("order {order_id} can no longer be {action} (status: {status})")]
    Ineligible {
        /// The order ID.
        order_id: String,
        /// The stored status that blocked the operation.
        status: OrderStatus,
        /// The refused operation.
        action: LifecycleAction,
    },

    /// The spreadsheet call failed after the rate limiter admitted it.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Best-effort notification delivery failed.
    #[error("notification error: {0}")]
    Notification(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl OrderError {
    /// Build a `NotFound` error for the given order id.
    pub fn not_found(order_id: impl fmt::Display) -> Self {
        Self::NotFound {
            order_id: order_id.to_string(),
        }
    }

    /// Stable machine-readable code, for UIs that pick a message per failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidId(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AlreadyCancelled { .. } => "already_cancelled",
            Self::Ineligible {
                action: LifecycleAction::Cancel,
                ..
            } => "not_cancellable",
            Self::Ineligible {
                action: LifecycleAction::Retry,
                ..
            } => "not_retryable",
            Self::Persistence(_) => "persistence_error",
            Self::Notification(_) => "notification_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Whether the error is caused by the request rather than the backend.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Persistence(_) | Self::Notification(_) | Self::Configuration(_)
        )
    }
}
