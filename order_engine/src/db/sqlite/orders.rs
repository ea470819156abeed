use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{Buyer, GatewayInvoice, NewOrder, Order, OrderId, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::TransitionEffects,
};

const SOLD_STATUSES: &str = "('paid', 'delivered', 'completed')";

/// Inserts a new pending order, unless the listing already has a sold order. Returns `None` in that case.
///
/// The sold-listing check and the insert are one statement, so no other writer can slip in between them.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let (user_id, user_email, guest_email, guest_name) = match order.buyer {
        Buyer::Account { user_id, email } => (Some(user_id), Some(email), None, None),
        Buyer::Guest { email, name } => (None, None, Some(email), Some(name)),
    };
    let sql = format!(
        r#"
        INSERT INTO orders (
            id,
            listing_id,
            user_id,
            user_email,
            guest_email,
            guest_name,
            channel_access_email,
            original_price,
            original_currency,
            amount,
            currency,
            exchange_rate,
            status,
            created_at,
            updated_at
        )
        SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending', $13, $14
        WHERE NOT EXISTS (SELECT 1 FROM orders WHERE listing_id = $15 AND status IN {SOLD_STATUSES})
        RETURNING *;
    "#
    );
    let order = sqlx::query_as(&sql)
        .bind(order.id.as_str())
        .bind(order.listing_id.as_str())
        .bind(user_id)
        .bind(user_email)
        .bind(guest_email)
        .bind(guest_name)
        .bind(order.channel_access_email)
        .bind(order.original_price.value())
        .bind(order.original_currency)
        .bind(order.amount.value())
        .bind(order.currency)
        .bind(order.exchange_rate)
        .bind(order.created_at)
        .bind(order.created_at)
        .bind(order.listing_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(first_row(order))
}

/// Writes with `RETURNING` are always read to completion. Stopping at the first row leaves the statement open, and
/// the write stays invisible to other connections until it is reset.
fn first_row(rows: Vec<Order>) -> Option<Order> {
    rows.into_iter().next()
}

pub async fn is_listing_sold(listing_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM orders WHERE listing_id = $1 AND status IN {SOLD_STATUSES}");
    let count: i64 = sqlx::query_scalar(&sql).bind(listing_id).fetch_one(conn).await?;
    Ok(count > 0)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Looks the order up by the provider's order id (which is normally our own id), then by the provider's invoice id.
pub async fn fetch_order_by_gateway_ref(
    external_order_id: &str,
    invoice_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE gateway_order_id = $1 OR id = $2 LIMIT 1")
        .bind(external_order_id)
        .bind(external_order_id)
        .fetch_optional(&mut *conn)
        .await?;
    if order.is_some() || invoice_id.is_empty() {
        return Ok(order);
    }
    trace!("🗃️ No order for gateway order id {external_order_id}. Trying invoice id {invoice_id}");
    let order = sqlx::query_as("SELECT * FROM orders WHERE gateway_invoice_id = $1 LIMIT 1")
        .bind(invoice_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn attach_invoice(
    order_id: &OrderId,
    invoice: &GatewayInvoice,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET
            gateway_invoice_id = $1,
            gateway_order_id = $2,
            payment_url = $3,
            payment_network = $4,
            payment_address = $5,
            payment_amount = $6,
            payment_status = $7,
            expires_at = $8,
            updated_at = $9
        WHERE id = $10 AND status = 'pending'
        RETURNING *;
    "#,
    )
    .bind(invoice.invoice_id.as_str())
    .bind(invoice.external_order_id.as_str())
    .bind(invoice.payment_url.as_str())
    .bind(invoice.network.as_deref())
    .bind(invoice.address.as_deref())
    .bind(invoice.payment_amount.as_deref())
    .bind(invoice.payment_status.as_str())
    .bind(invoice.expires_at)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(first_row(order))
}

pub async fn record_payment_status(
    order_id: &OrderId,
    payment_status: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET payment_status = $1, updated_at = $2 WHERE id = $3 AND payment_status IS NOT $4",
    )
    .bind(payment_status)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .bind(payment_status)
    .execute(conn)
    .await?;
    Ok(())
}

/// The guarded status update. See [`crate::traits::OrderStore::try_transition`].
///
/// The caller is responsible for checking that the transition is legal.
pub async fn update_status_if(
    order_id: &OrderId,
    from: &[OrderStatusType],
    to: OrderStatusType,
    effects: TransitionEffects,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let now = Utc::now();
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(to.as_str());
    builder.push(", updated_at = ");
    builder.push_bind(now);
    let stamp = match to {
        OrderStatusType::Paid => Some("paid_at"),
        OrderStatusType::Delivered => Some("delivered_at"),
        OrderStatusType::Completed => Some("completed_at"),
        OrderStatusType::Cancelled => Some("cancelled_at"),
        OrderStatusType::Pending | OrderStatusType::Expired => None,
    };
    if let Some(column) = stamp {
        builder.push(format!(", {column} = "));
        builder.push_bind(now);
    }
    if let Some(payment_status) = effects.payment_status {
        builder.push(", payment_status = ");
        builder.push_bind(payment_status);
    }
    if let Some(reason) = effects.status_reason {
        builder.push(", status_reason = ");
        builder.push_bind(reason);
    }
    if let Some(details) = effects.delivery_details {
        builder.push(", delivery_details = ");
        builder.push_bind(details);
    }
    if let Some(notes) = effects.delivery_notes {
        builder.push(", delivery_notes = ");
        builder.push_bind(notes);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(status.as_str());
    }
    statuses.push_unseparated(")");
    if to == OrderStatusType::Paid {
        builder.push(format!(
            " AND NOT EXISTS (SELECT 1 FROM orders AS sold WHERE sold.listing_id = orders.listing_id AND sold.id <> \
             orders.id AND sold.status IN {SOLD_STATUSES})"
        ));
    }
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = first_row(builder.build_query_as::<Order>().fetch_all(conn).await?);
    match &order {
        Some(o) => debug!("🗃️ Order {order_id} moved to {}", o.status),
        None => debug!("🗃️ Order {order_id} was not in any of {from:?}. No change made."),
    }
    Ok(order)
}

pub async fn expire_stale_orders(
    now: DateTime<Utc>,
    fallback_cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'expired', updated_at = $1
        WHERE status = 'pending' AND (
            (expires_at IS NOT NULL AND unixepoch(expires_at) < unixepoch($2)) OR
            (expires_at IS NULL AND unixepoch(created_at) < unixepoch($3))
        )
        RETURNING *;
    "#,
    )
    .bind(now)
    .bind(now)
    .bind(fallback_cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(listing_id) = query.listing_id {
        where_clause.push("listing_id = ");
        where_clause.push_bind_unseparated(listing_id);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(email) = query.guest_email {
        where_clause.push("guest_email = ");
        where_clause.push_bind_unseparated(email);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("unixepoch(created_at) >= unixepoch(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("unixepoch(created_at) <= unixepoch(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}
