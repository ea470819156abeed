use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId},
    order_objects::{check_access, OrderAccess, OrderQueryFilter, Requester},
    traits::OrderStore,
    OrderFlowError,
};

/// Read-only order lookups, with the buyer access rules applied.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B>
where B: OrderStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches an order on behalf of `requester`. The gateway is not consulted. See [`check_access`] for the rules.
    pub async fn fetch_order_for(
        &self,
        order_id: &OrderId,
        requester: &Requester,
        email: Option<&str>,
    ) -> Result<OrderAccess, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?;
        let access = check_access(order, requester, email);
        trace!("🔄️🔍️ Access to order {order_id}: {}", access_label(&access));
        Ok(access)
    }

    /// Admin search over all orders.
    pub async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        debug!("🔄️🔍️ Searching orders: {filter}");
        let orders = self.db.search_orders(filter).await?;
        Ok(orders)
    }

    /// All orders placed by an account, newest first.
    pub async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        let filter = OrderQueryFilter::default().with_user_id(user_id);
        let mut orders = self.db.search_orders(filter).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

fn access_label(access: &OrderAccess) -> &'static str {
    match access {
        OrderAccess::Buyer(_) => "buyer",
        OrderAccess::Admin(_) => "admin",
        OrderAccess::EmailRequired => "email required",
        OrderAccess::NotFound => "not found",
    }
}
