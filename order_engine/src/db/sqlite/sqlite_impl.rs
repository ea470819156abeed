//! `SqliteDatabase` is the SQLite implementation of the engine backend traits.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::{migrate::Migrator, SqlitePool};

use super::{db_url, exchange_rates, listings, new_pool, orders};
use crate::{
    db_types::{ExchangeRate, GatewayInvoice, Listing, NewOrder, Order, OrderId, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::{ExchangeRateError, ExchangeRates, ListingCatalog, OrderStore, StoreError, TransitionEffects},
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./src/db/sqlite/migrations");

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `MKT_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        MIGRATOR.run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Mirrors a listing from the catalog into the local listings table.
    pub async fn upsert_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        listings::upsert_listing(listing, &mut conn).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let listing_id = order.listing_id.clone();
        let order = orders::insert_order(order, &mut tx).await?.ok_or(StoreError::ListingSold(listing_id))?;
        tx.commit().await?;
        debug!("🗃️ Order {} for listing {} has been saved in the DB", order.id, order.listing_id);
        Ok(order)
    }

    async fn is_listing_sold(&self, listing_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let sold = orders::is_listing_sold(listing_id, &mut conn).await?;
        Ok(sold)
    }

    async fn attach_invoice(&self, order_id: &OrderId, invoice: &GatewayInvoice) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::attach_invoice(order_id, invoice, &mut tx).await?;
        tx.commit().await?;
        if order.is_none() {
            warn!("🗃️ Invoice {} could not be attached to order {order_id}. It is no longer pending.", invoice.invoice_id);
        }
        Ok(order)
    }

    async fn record_payment_status(&self, order_id: &OrderId, payment_status: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::record_payment_status(order_id, payment_status, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn try_transition(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
        to: OrderStatusType,
        effects: TransitionEffects,
    ) -> Result<Option<Order>, StoreError> {
        if let Some(bad) = from.iter().find(|s| !s.can_transition_to(to)) {
            return Err(StoreError::IllegalTransition { from: *bad, to });
        }
        if from.is_empty() {
            return Ok(None);
        }
        let has_details = effects.delivery_details.as_ref().is_some_and(|d| !d.trim().is_empty());
        if to == OrderStatusType::Delivered && !has_details {
            return Err(StoreError::InvalidOrder("Delivery details are required to deliver an order".into()));
        }
        // Orders skipping `delivered` must still carry delivery details once completed
        if to == OrderStatusType::Completed && from.contains(&OrderStatusType::Paid) && !has_details {
            return Err(StoreError::InvalidOrder("Delivery details are required to complete a paid order".into()));
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::update_status_if(order_id, from, to, effects, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn expire_stale_orders(&self, now: DateTime<Utc>, fallback: Duration) -> Result<Vec<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let expired = orders::expire_stale_orders(now, now - fallback, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ {} stale orders expired", expired.len());
        Ok(expired)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_gateway_ref(
        &self,
        external_order_id: &str,
        invoice_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_gateway_ref(external_order_id, invoice_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl ListingCatalog for SqliteDatabase {
    async fn fetch_listing(&self, listing_id: &str) -> Result<Option<Listing>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let listing = listings::fetch_listing(listing_id, &mut conn).await?;
        Ok(listing)
    }
}

impl ExchangeRates for SqliteDatabase {
    async fn fetch_last_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let mut conn = self.pool.acquire().await?;
        exchange_rates::fetch_last_rate(base, quote, &mut conn).await
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        let mut conn = self.pool.acquire().await?;
        exchange_rates::set_exchange_rate(rate, &mut conn).await
    }
}
