use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{GatewayInvoice, Listing, NewOrder, Order, OrderId, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::{ExchangeRates, TransitionEffects},
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Listing {0} has already been sold")]
    ListingSold(String),
    #[error("An order may not move from {from} to {to}")]
    IllegalTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Invalid order data: {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// The durable order record.
///
/// Implementations must apply every status change as one conditional update scoped by order id and expected prior
/// status. Concurrent callers race on that update and exactly one of them wins.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Inserts a new `pending` order. The insert is refused with [`StoreError::ListingSold`] if any order for the same
    /// listing is already paid, delivered or completed.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Whether the listing already has a paid, delivered or completed order.
    async fn is_listing_sold(&self, listing_id: &str) -> Result<bool, StoreError>;

    /// Persists the invoice correlation fields onto the order, provided it is still `pending`. Returns `None` if the
    /// order has moved on in the meantime.
    async fn attach_invoice(&self, order_id: &OrderId, invoice: &GatewayInvoice) -> Result<Option<Order>, StoreError>;

    /// Mirrors the provider's payment status string onto the order without touching its status.
    async fn record_payment_status(&self, order_id: &OrderId, payment_status: &str) -> Result<(), StoreError>;

    /// The single state-machine primitive.
    ///
    /// Sets the order's status to `to` and applies `effects`, but only if the current status is one of `from`. A move
    /// to `paid` is additionally refused while another order for the same listing is sold.
    ///
    /// Returns `Some(order)` if this call made the change and `None` if the guard failed. `None` is not an error: the
    /// order was moved by someone else and the caller should re-read it.
    ///
    /// Every status in `from` must be allowed to move to `to` by [`OrderStatusType::can_transition_to`], otherwise
    /// [`StoreError::IllegalTransition`] is returned and nothing is changed.
    async fn try_transition(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
        to: OrderStatusType,
        effects: TransitionEffects,
    ) -> Result<Option<Order>, StoreError>;

    /// Expires, in a single statement, every `pending` order whose invoice expiry is before `now`, or which has no
    /// invoice expiry and was created more than `fallback` before `now`. Returns the orders that were expired.
    async fn expire_stale_orders(&self, now: DateTime<Utc>, fallback: Duration) -> Result<Vec<Order>, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Finds an order by the provider's order id, falling back to the provider's invoice id.
    async fn fetch_order_by_gateway_ref(
        &self,
        external_order_id: &str,
        invoice_id: &str,
    ) -> Result<Option<Order>, StoreError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;
}

/// Read-only access to the listing catalog.
#[allow(async_fn_in_trait)]
pub trait ListingCatalog {
    async fn fetch_listing(&self, listing_id: &str) -> Result<Option<Listing>, StoreError>;
}

/// A backend that can serve as the whole persistence layer.
pub trait MarketDatabase: Clone + OrderStore + ListingCatalog + ExchangeRates {}

impl<T> MarketDatabase for T where T: Clone + OrderStore + ListingCatalog + ExchangeRates {}
