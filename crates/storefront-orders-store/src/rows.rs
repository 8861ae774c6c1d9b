//! Conversion between orders and Orders sheet rows.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use storefront_orders_core::{Customer, Order, OrderId, OrderStatus, PaymentMethod};

use crate::error::{GatewayError, Result};
use crate::gateway::Row;
use crate::schema::order_col as col;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Render an order as an Orders sheet row.
///
/// # Errors
///
/// Returns `GatewayError::Malformed` if a nested value cannot be serialized.
pub fn encode_order(order: &Order) -> Result<Row> {
    let mut row = vec![String::new(); col::COUNT];
    row[col::ID] = order.id.to_string();
    row[col::CUSTOMER_ID] = order.customer.id.to_string();
    row[col::CUSTOMER_NAME].clone_from(&order.customer.name);
    row[col::CUSTOMER_EMAIL].clone_from(&order.customer.email);
    row[col::ITEMS] = to_json(&order.items)?;
    row[col::TOTAL] = format_cents(order.total_cents);
    row[col::STATUS] = order.status.to_string();
    row[col::PAYMENT_METHOD] = order.payment_method.to_string();
    row[col::PAYMENT_ID] = order.payment_id.clone().unwrap_or_default();
    row[col::PAYMENT_STATUS] = order
        .payment_status
        .map(|status| status.to_string())
        .unwrap_or_default();
    row[col::SHIPPING_ADDRESS] = match &order.shipping_address {
        Some(address) => to_json(address)?,
        None => String::new(),
    };
    row[col::TRACKING_NUMBER] = order.tracking_number.clone().unwrap_or_default();
    row[col::ESTIMATED_DELIVERY] = order
        .estimated_delivery
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_default();
    row[col::NOTES].clone_from(&order.notes);
    row[col::CANCELLATION_REASON] = order.cancellation_reason.clone().unwrap_or_default();
    row[col::CANCELLED_BY] = order.cancelled_by.clone().unwrap_or_default();
    row[col::CREATED_AT] = format_timestamp(order.created_at);
    row[col::UPDATED_AT] = format_timestamp(order.updated_at);
    Ok(row)
}

/// Parse an Orders sheet row.
///
/// Short rows are accepted; missing trailing cells read as empty.
///
/// # Errors
///
/// Returns `GatewayError::Malformed` naming the first offending column.
pub fn decode_order(row: &[String]) -> Result<Order> {
    let id: OrderId = cell(row, col::ID)
        .parse()
        .map_err(|e| malformed("id", &e))?;
    let customer = Customer {
        id: cell(row, col::CUSTOMER_ID)
            .parse()
            .map_err(|e| malformed("customerId", &e))?,
        name: cell(row, col::CUSTOMER_NAME).to_string(),
        email: cell(row, col::CUSTOMER_EMAIL).to_string(),
    };
    let items = from_json(cell(row, col::ITEMS), "items")?;
    let total_cents = parse_cents(cell(row, col::TOTAL))
        .ok_or_else(|| malformed("total", &cell(row, col::TOTAL)))?;
    let status: OrderStatus = cell(row, col::STATUS)
        .parse()
        .map_err(|e| malformed("status", &e))?;
    let payment_status = match optional(row, col::PAYMENT_STATUS) {
        Some(value) => Some(value.parse().map_err(|e| malformed("paymentStatus", &e))?),
        None => None,
    };
    let shipping_address = match optional(row, col::SHIPPING_ADDRESS) {
        Some(value) => Some(from_json(&value, "shippingAddress")?),
        None => None,
    };
    let estimated_delivery = match optional(row, col::ESTIMATED_DELIVERY) {
        Some(value) => Some(
            NaiveDate::parse_from_str(&value, DATE_FORMAT)
                .map_err(|e| malformed("estimatedDelivery", &e))?,
        ),
        None => None,
    };
    let created_at = parse_timestamp(cell(row, col::CREATED_AT), "createdAt")?;
    let updated_at = match optional(row, col::UPDATED_AT) {
        Some(value) => parse_timestamp(&value, "updatedAt")?,
        None => created_at,
    };

    Ok(Order {
        id,
        customer,
        items,
        total_cents,
        status,
        payment_method: PaymentMethod::from(cell(row, col::PAYMENT_METHOD)),
        payment_id: optional(row, col::PAYMENT_ID),
        payment_status,
        shipping_address,
        tracking_number: optional(row, col::TRACKING_NUMBER),
        estimated_delivery,
        notes: cell(row, col::NOTES).to_string(),
        cancellation_reason: optional(row, col::CANCELLATION_REASON),
        cancelled_by: optional(row, col::CANCELLED_BY),
        created_at,
        updated_at,
    })
}

/// The order ID cell of a row, trimmed. Empty for blank rows.
#[must_use]
pub fn row_order_id(row: &[String]) -> &str {
    cell(row, col::ID)
}

/// Format minor units as a two-decimal amount, e.g. `200.00`.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parse a decimal amount into minor units.
///
/// Accepts currency symbols and thousands separators as operators type them
/// (`$1,250.5`). A single comma followed by one or two digits and no point is
/// a decimal comma (`200,50`). Commas elsewhere must group thousands; anything
/// else is rejected. At most two decimal places.
#[must_use]
pub fn parse_cents(value: &str) -> Option<i64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ' '))
        .collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let (whole, fraction) = split_decimal(digits);
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let whole = ungroup_thousands(whole)?;
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(&whole) || !all_digits(fraction) || fraction.len() > 2 {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: i64 = format!("{fraction:0<2}").parse().ok()?;
    let cents = whole.checked_mul(100)?.checked_add(fraction)?;
    Some(if negative { -cents } else { cents })
}

fn split_decimal(digits: &str) -> (&str, &str) {
    if let Some(split) = digits.split_once('.') {
        return split;
    }
    digits
        .split_once(',')
        .filter(|(_, fraction)| (1..=2).contains(&fraction.len()) && !fraction.contains(','))
        .unwrap_or((digits, ""))
}

/// Drop thousands separators, requiring groups of exactly three digits.
fn ungroup_thousands(whole: &str) -> Option<String> {
    let mut groups = whole.split(',');
    let lead = groups.next().unwrap_or_default();
    let mut joined = lead.to_string();
    let mut grouped = false;
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        grouped = true;
        joined.push_str(group);
    }
    if grouped && !(1..=3).contains(&lead.len()) {
        return None;
    }
    Some(joined)
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| malformed(column, &e))
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", |value| value.trim())
}

fn optional(row: &[String], index: usize) -> Option<String> {
    let value = cell(row, index);
    (!value.is_empty()).then(|| value.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| GatewayError::Malformed(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: &str, column: &str) -> Result<T> {
    serde_json::from_str(value).map_err(|e| malformed(column, &e))
}

fn malformed(column: &str, detail: &dyn std::fmt::Display) -> GatewayError {
    GatewayError::Malformed(format!("column {column}: {detail}"))
}
