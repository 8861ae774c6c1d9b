//! Order store over the Orders sheet.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use storefront_orders_core::{
    check_cancel, check_retry, check_transition, CustomerId, NewOrder, Order, OrderError,
    OrderId, OrderStatus, PaymentUpdate, Result, RetryAttempt, StatusUpdate,
};

use crate::cache::KeyedCache;
use crate::config::StoreConfig;
use crate::error::GatewayError;
use crate::gateway::{Row, SheetsGateway};
use crate::keys::{self, CacheKey};
use crate::limiter::RateLimiter;
use crate::notify::{NotificationDispatcher, OrderEvent};
use crate::rows::{decode_order, encode_order, row_order_id};
use crate::schema::{is_orders_header, ORDERS_HEADER};

/// Values held in the order cache.
#[derive(Debug, Clone)]
enum CacheValue {
    Order(Box<Order>),
    Orders(Arc<Vec<Order>>),
}

/// Create, find and mutate orders stored one per row in a spreadsheet.
///
/// Every spreadsheet call goes through the shared [`RateLimiter`]. Reads by id
/// and list queries are cached for a short TTL; every write deletes the
/// affected cache entries rather than overwriting them, so an operator's
/// direct edit to the sheet becomes visible on the next read.
///
/// Lifecycle rules are checked before any write. Notifications are dispatched
/// only after the row is written and their failures never reach the caller.
///
/// # Known limitations
///
/// - Two concurrent mutations of the same order (for example two
///   [`update_for_retry`](Self::update_for_retry) calls) race with
///   last-write-wins semantics; there is no lock across the read and the write.
/// - Retrying [`create`](Self::create) after a `Persistence` error can create
///   a duplicate row if the first append actually landed. Once an id is known,
///   callers should use `update_for_retry` instead.
pub struct OrderStore {
    gateway: Arc<dyn SheetsGateway>,
    limiter: Arc<RateLimiter>,
    cache: KeyedCache<CacheValue>,
    sheet: String,
    ttl: Duration,
    notifier: NotificationDispatcher,
}

impl OrderStore {
    /// Create a store over `gateway`, sharing `limiter` with other callers.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn SheetsGateway>,
        limiter: Arc<RateLimiter>,
        config: &StoreConfig,
        notifier: NotificationDispatcher,
    ) -> Self {
        let cache = match config.cache_capacity {
            Some(capacity) => KeyedCache::bounded(capacity),
            None => KeyedCache::new(),
        };
        Self {
            gateway,
            limiter,
            cache,
            sheet: config.orders_sheet.clone(),
            ttl: config.order_cache_ttl,
            notifier,
        }
    }

    /// Write the header row if the Orders sheet is empty.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Persistence` if the sheet cannot be read or written.
    pub async fn ensure_schema(&self) -> Result<()> {
        let rows = self.read_all().await?;
        match rows.first() {
            None => {
                let header: Row = ORDERS_HEADER.iter().map(|h| (*h).to_string()).collect();
                self.limiter
                    .execute(|| self.gateway.append_row(&self.sheet, header))
                    .await
                    .map_err(persistence("write header"))?;
                info!(sheet = %self.sheet, "wrote orders sheet header");
            }
            Some(first) if !is_orders_header(first) => {
                warn!(sheet = %self.sheet, "orders sheet does not start with a header row");
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Validate and append a new order. Returns its id.
    ///
    /// A client-proposed id is kept if no row uses it yet; otherwise a fresh
    /// id is generated.
    ///
    /// # Errors
    ///
    /// - `OrderError::Validation` for missing or inconsistent fields; nothing
    ///   is written.
    /// - `OrderError::Persistence` if the append fails.
    pub async fn create(&self, new: NewOrder) -> Result<OrderId> {
        let requested = new.id.clone();
        let mut order = Order::from_new(new, OrderId::generate(), Utc::now())?;

        if let Some(requested) = requested {
            if self.locate(&requested).await?.is_none() {
                order.id = requested;
            } else {
                warn!(
                    requested = %requested,
                    assigned = %order.id,
                    "requested order id already in use, assigning a new one"
                );
            }
        }

        let row = encode_order(&order).map_err(persistence("encode order"))?;
        self.limiter
            .execute(|| self.gateway.append_row(&self.sheet, row))
            .await
            .map_err(persistence("append order"))?;
        self.invalidate(&order).await;

        info!(
            order_id = %order.id,
            customer_id = %order.customer.id,
            total_cents = order.total_cents,
            payment_method = %order.payment_method,
            "order created"
        );
        self.notifier.dispatch(OrderEvent::Created, &order);
        Ok(order.id)
    }

    /// Look up an order by id, from cache when fresh.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if no row has this id. Misses are not cached.
    /// - `OrderError::Persistence` if the sheet cannot be read or the row is
    ///   malformed.
    pub async fn find_by_id(&self, order_id: &OrderId) -> Result<Order> {
        let key = keys::order_by_id(order_id);
        if let Some(CacheValue::Order(order)) = self.cache.get(&key).await {
            debug!(order_id = %order_id, "order cache hit");
            return Ok(*order);
        }
        debug!(order_id = %order_id, "order cache miss");

        let (_, order) = self
            .locate(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found(order_id))?;
        self.cache
            .set(key, CacheValue::Order(Box::new(order.clone())), self.ttl)
            .await;
        Ok(order)
    }

    /// Reuse an existing order for a new checkout attempt.
    ///
    /// Overwrites the payment fields in place and leaves the order in
    /// `payment_pending`. Never appends a row.
    ///
    /// # Errors
    ///
    /// - `OrderError::Validation` for an invalid attempt.
    /// - `OrderError::NotFound` if the order does not exist or belongs to a
    ///   different customer.
    /// - `OrderError::Ineligible` once the order is past the payment stage.
    /// - `OrderError::Persistence` if the sheet call fails.
    pub async fn update_for_retry(&self, order_id: &OrderId, attempt: RetryAttempt) -> Result<Order> {
        attempt.validate()?;
        let (row_number, mut order) = self.locate_existing(order_id).await?;
        if !order.belongs_to(&attempt.customer_id) {
            warn!(
                order_id = %order_id,
                customer_id = %attempt.customer_id,
                "retry requested for an order owned by another customer"
            );
            return Err(OrderError::not_found(order_id));
        }
        check_retry(&order)?;

        order.apply_retry(attempt, Utc::now());
        self.write(row_number, &order).await?;
        info!(
            order_id = %order.id,
            payment_method = %order.payment_method,
            total_cents = order.total_cents,
            "order reset for payment retry"
        );
        Ok(order)
    }

    /// Cancel an order that has not yet been paid for.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order does not exist.
    /// - `OrderError::AlreadyCancelled` or `OrderError::Ineligible`; the stored
    ///   order is left untouched.
    /// - `OrderError::Persistence` if the sheet call fails.
    pub async fn cancel(&self, order_id: &OrderId, reason: &str, actor_email: &str) -> Result<Order> {
        let (row_number, mut order) = self.locate_existing(order_id).await?;
        check_cancel(&order)?;

        order.apply_cancel(reason, actor_email, Utc::now());
        self.write(row_number, &order).await?;
        info!(order_id = %order.id, reason = %reason, cancelled_by = %actor_email, "order cancelled");
        self.notifier.dispatch(OrderEvent::Cancelled, &order);
        Ok(order)
    }

    /// Move an order along its lifecycle, merging fields relevant to `status`.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order does not exist.
    /// - `OrderError::InvalidTransition` for backward moves or moves out of a
    ///   terminal status; cancellations follow the rules of [`cancel`](Self::cancel).
    /// - `OrderError::Persistence` if the sheet call fails.
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        update: StatusUpdate,
    ) -> Result<Order> {
        let (row_number, mut order) = self.locate_existing(order_id).await?;
        check_transition(&order, status)?;

        let previous = order.status;
        order.apply_status(status, update, Utc::now());
        self.write(row_number, &order).await?;
        info!(order_id = %order.id, from = %previous, to = %status, "order status updated");

        let event = if status == OrderStatus::Cancelled {
            OrderEvent::Cancelled
        } else {
            OrderEvent::StatusChanged { previous }
        };
        self.notifier.dispatch(event, &order);
        Ok(order)
    }

    /// Record a payment gateway outcome.
    ///
    /// `approved` confirms the order; `rejected` and `cancelled` mark the
    /// payment failed; `pending` keeps the status. An outcome the lifecycle
    /// does not allow is stored on the payment fields only. Redelivery of an
    /// outcome already recorded returns the order without writing.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the order does not exist.
    /// - `OrderError::Persistence` if the sheet call fails.
    pub async fn record_payment(&self, order_id: &OrderId, payment: PaymentUpdate) -> Result<Order> {
        let (row_number, mut order) = self.locate_existing(order_id).await?;
        if order.has_payment(&payment) {
            debug!(order_id = %order_id, payment_id = %payment.payment_id, "payment already recorded");
            return Ok(order);
        }

        let previous = order.status;
        let target = payment
            .payment_status
            .implied_order_status()
            .filter(|&to| to != previous);
        let status = match target {
            Some(to) if check_transition(&order, to).is_ok() => Some(to),
            Some(to) => {
                warn!(
                    order_id = %order_id,
                    from = %previous,
                    to = %to,
                    payment_status = %payment.payment_status,
                    "payment outcome does not fit order lifecycle, status kept"
                );
                None
            }
            None => None,
        };

        order.apply_payment(&payment, status, Utc::now());
        self.write(row_number, &order).await?;
        info!(
            order_id = %order.id,
            payment_id = %payment.payment_id,
            payment_status = %payment.payment_status,
            status = %order.status,
            "payment recorded"
        );
        if status.is_some() {
            self.notifier
                .dispatch(OrderEvent::StatusChanged { previous }, &order);
        }
        Ok(order)
    }

    /// Orders placed by `customer_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Persistence` if the sheet cannot be read.
    pub async fn find_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<Order>> {
        let key = keys::orders_by_customer(customer_id);
        self.cached_list(key, |order| order.belongs_to(customer_id))
            .await
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Persistence` if the sheet cannot be read.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.cached_list(keys::all_orders(), |_| true).await
    }

    async fn cached_list(&self, key: CacheKey, keep: impl Fn(&Order) -> bool) -> Result<Vec<Order>> {
        if let Some(CacheValue::Orders(orders)) = self.cache.get(&key).await {
            debug!(key = %key, "order list cache hit");
            return Ok(orders.as_ref().clone());
        }

        let rows = self.read_all().await?;
        let mut orders: Vec<Order> = self
            .decode_rows(&rows)
            .filter(|order| keep(order))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.cache
            .set(key, CacheValue::Orders(Arc::new(orders.clone())), self.ttl)
            .await;
        Ok(orders)
    }

    fn decode_rows<'a>(&self, rows: &'a [Row]) -> impl Iterator<Item = Order> + 'a {
        let sheet = self.sheet.clone();
        rows.iter()
            .enumerate()
            .filter(|(_, row)| !is_orders_header(row) && !row_order_id(row).is_empty())
            .filter_map(move |(index, row)| match decode_order(row) {
                Ok(order) => Some(order),
                Err(e) => {
                    warn!(sheet = %sheet, row = index + 1, error = %e, "skipping malformed order row");
                    None
                }
            })
    }

    async fn read_all(&self) -> Result<Vec<Row>> {
        self.limiter
            .execute(|| self.gateway.read_rows(&self.sheet))
            .await
            .map_err(persistence("read orders"))
    }

    /// Find the row holding `order_id`, bypassing the cache.
    ///
    /// Returns the 1-based sheet row number with the decoded order.
    async fn locate(&self, order_id: &OrderId) -> Result<Option<(usize, Order)>> {
        let rows = self.read_all().await?;
        let mut matches = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !is_orders_header(row) && row_order_id(row) == order_id.as_str());

        let Some((index, row)) = matches.next() else {
            return Ok(None);
        };
        let duplicates = matches.count();
        if duplicates > 0 {
            warn!(order_id = %order_id, duplicates, "order id appears on several rows, using the first");
        }
        let order = decode_order(row).map_err(persistence("decode order"))?;
        Ok(Some((index + 1, order)))
    }

    async fn locate_existing(&self, order_id: &OrderId) -> Result<(usize, Order)> {
        self.locate(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found(order_id))
    }

    async fn write(&self, row_number: usize, order: &Order) -> Result<()> {
        let row = encode_order(order).map_err(persistence("encode order"))?;
        self.limiter
            .execute(|| self.gateway.update_row(&self.sheet, row_number, row))
            .await
            .map_err(persistence("update order"))?;
        self.invalidate(order).await;
        Ok(())
    }

    async fn invalidate(&self, order: &Order) {
        self.cache.delete(&keys::order_by_id(&order.id)).await;
        self.cache.delete(&keys::orders_by_customer(&order.customer.id)).await;
        self.cache.delete(&keys::all_orders()).await;
    }
}

impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStore")
            .field("sheet", &self.sheet)
            .field("ttl", &self.ttl)
            .field("cached_entries", &self.cache.approximate_len())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

fn persistence(operation: &'static str) -> impl FnOnce(GatewayError) -> OrderError {
    move |e| {
        error!(operation, error = %e, "spreadsheet call failed");
        OrderError::Persistence(format!("{operation}: {e}"))
    }
}
