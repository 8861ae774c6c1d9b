//! Sheet names and column layout.
//!
//! The Orders sheet holds one order per row with columns mapped 1:1 to order
//! fields. Nested values (items, shipping address) are stored as JSON text.

/// Sheet holding one row per order.
pub const ORDERS_SHEET: &str = "Orders";

/// Sheet holding one row per user, including a role column.
pub const USERS_SHEET: &str = "Users";

/// Orders sheet column indices.
pub mod order_col {
    /// Order ID.
    pub const ID: usize = 0;
    /// Customer ID.
    pub const CUSTOMER_ID: usize = 1;
    /// Customer display name.
    pub const CUSTOMER_NAME: usize = 2;
    /// Customer email.
    pub const CUSTOMER_EMAIL: usize = 3;
    /// Line items as JSON.
    pub const ITEMS: usize = 4;
    /// Total as a decimal amount.
    pub const TOTAL: usize = 5;
    /// Order status.
    pub const STATUS: usize = 6;
    /// Payment method.
    pub const PAYMENT_METHOD: usize = 7;
    /// Payment gateway reference.
    pub const PAYMENT_ID: usize = 8;
    /// Payment gateway status.
    pub const PAYMENT_STATUS: usize = 9;
    /// Shipping address as JSON.
    pub const SHIPPING_ADDRESS: usize = 10;
    /// Carrier tracking number.
    pub const TRACKING_NUMBER: usize = 11;
    /// Estimated delivery date.
    pub const ESTIMATED_DELIVERY: usize = 12;
    /// Free-text notes.
    pub const NOTES: usize = 13;
    /// Reason given on cancellation.
    pub const CANCELLATION_REASON: usize = 14;
    /// Who cancelled the order.
    pub const CANCELLED_BY: usize = 15;
    /// Creation timestamp.
    pub const CREATED_AT: usize = 16;
    /// Last mutation timestamp.
    pub const UPDATED_AT: usize = 17;

    /// Number of columns.
    pub const COUNT: usize = 18;
}

/// Header row of the Orders sheet.
pub const ORDERS_HEADER: [&str; order_col::COUNT] = [
    "id",
    "customerId",
    "customerName",
    "customerEmail",
    "items",
    "total",
    "status",
    "paymentMethod",
    "paymentId",
    "paymentStatus",
    "shippingAddress",
    "trackingNumber",
    "estimatedDelivery",
    "notes",
    "cancellationReason",
    "cancelledBy",
    "createdAt",
    "updatedAt",
];

/// Users sheet header names. Columns are located by name, not position.
pub mod users_col {
    /// Email column header.
    pub const EMAIL: &str = "email";
    /// Role column header.
    pub const ROLE: &str = "role";
}

/// Role value that grants administrator access.
pub const ADMIN_ROLE: &str = "admin";

/// Whether `row` is the Orders header row.
///
/// Both the id and status cells must carry their column names, so an order
/// whose id happens to be `id` is still data.
#[must_use]
pub fn is_orders_header(row: &[String]) -> bool {
    let names_column = |column: usize| {
        row.get(column)
            .is_some_and(|cell| cell.trim().eq_ignore_ascii_case(ORDERS_HEADER[column]))
    };
    names_column(order_col::ID) && names_column(order_col::STATUS)
}
