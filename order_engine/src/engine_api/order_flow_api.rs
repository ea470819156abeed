use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{InvoiceSettlement, Order, OrderId, OrderStatusType, PaymentUpdate},
    events::{EventProducers, Notification, NotificationTemplate, OrderStatusChangedEvent},
    order_objects::{check_access, OrderAccess, Requester},
    traits::{InvoiceProvider, OrderStore, TransitionEffects},
    OrderFlowError,
};

pub const SALE_CONFLICT_REASON: &str = "Payment arrived after the listing was sold to another buyer";

/// `OrderFlowApi` reconciles orders with what the payment gateway reports. Both the webhook and the client poll come
/// through here and both end in the same guarded transitions, so it does not matter which of them (or how many
/// duplicates of them) arrive first.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    admin_email: Option<String>,
    fallback_timeout: Option<Duration>,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, admin_email: None, fallback_timeout: None }
    }

    /// Sets the address that receives admin alerts.
    pub fn with_admin_email(mut self, email: Option<String>) -> Self {
        self.admin_email = email;
        self
    }

    /// Lets polls expire pending orders that never got an invoice expiry once they are older than `timeout`, as the
    /// sweep does.
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = Some(timeout);
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: OrderStore,
    G: InvoiceProvider,
{
    /// Applies an authenticated payment notification.
    ///
    /// The order is located by the gateway's order id, then by invoice id. A duplicate or stale notification changes
    /// nothing and still succeeds, returning the order as it now stands.
    pub async fn process_payment_update(&self, update: PaymentUpdate) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_gateway_ref(&update.external_order_id, &update.invoice_id)
            .await?
            .ok_or_else(|| OrderFlowError::UnknownPaymentReference(update.external_order_id.clone()))?;
        debug!(
            "🔄️💰️ Payment update for order {}: {} ({:?})",
            order.id, update.payment_status, update.settlement
        );
        self.apply_settlement(order, update.settlement, &update.payment_status).await
    }

    /// Client-initiated status check.
    ///
    /// Access is checked first and the result of the check is what gets returned, with the freshest copy of the order
    /// inside. For a pending order the gateway is asked for the invoice status, and that status is applied exactly as a
    /// webhook would be. A gateway failure is logged and otherwise ignored. A pending order whose invoice has run out
    /// of time is expired, unless the gateway says it was paid. So is one without an invoice expiry that is older than
    /// the fallback timeout, when one is set.
    pub async fn poll_order(
        &self,
        order_id: &OrderId,
        requester: &Requester,
        email: Option<&str>,
    ) -> Result<OrderAccess, OrderFlowError> {
        let access = check_access(self.db.fetch_order(order_id).await?, requester, email);
        let Some(order) = access.order().cloned() else {
            return Ok(access);
        };
        if order.status != OrderStatusType::Pending {
            return Ok(access);
        }
        let mut order = order;
        if let Some(external_id) = order.gateway_order_id.clone() {
            match self.gateway.query_invoice(&external_id).await {
                Ok(invoice) => {
                    order = self.apply_settlement(order, invoice.settlement, &invoice.payment_status).await?;
                },
                Err(e) => warn!("🔄️ Could not fetch invoice status for order {order_id}. {e}"),
            }
        }
        if order.status == OrderStatusType::Pending && self.is_overdue(&order) {
            info!("🔄️ Order {order_id} has run out of time. Expiring the order.");
            if let Some(expired) = self
                .transition(&order, &[OrderStatusType::Pending], OrderStatusType::Expired, TransitionEffects::default())
                .await?
            {
                order = expired;
            }
        }
        let latest = self.db.fetch_order(order_id).await?.unwrap_or(order);
        Ok(access.with_order(latest))
    }

    fn is_overdue(&self, order: &Order) -> bool {
        let now = Utc::now();
        match (order.expires_at, self.fallback_timeout) {
            (Some(expires_at), _) => expires_at < now,
            (None, Some(fallback)) => order.created_at < now - fallback,
            (None, None) => false,
        }
    }

    /// Moves the order as far as `settlement` allows and returns the order as it stands afterwards, whoever moved it.
    async fn apply_settlement(
        &self,
        order: Order,
        settlement: InvoiceSettlement,
        payment_status: &str,
    ) -> Result<Order, OrderFlowError> {
        let effects = TransitionEffects::default().with_payment_status(payment_status);
        match settlement {
            InvoiceSettlement::Paid => {
                if let Some(paid) =
                    self.transition(&order, &[OrderStatusType::Pending], OrderStatusType::Paid, effects).await?
                {
                    info!("🔄️💰️ Order {} is paid", paid.id);
                    if let Some(admin) = &self.admin_email {
                        let note = Notification::for_admin(NotificationTemplate::OrderPaidAdmin, &paid, admin);
                        self.producers.publish_notification(note).await;
                    }
                    return Ok(paid);
                }
                let current = self.refetch(&order.id).await?;
                match current.status {
                    OrderStatusType::Pending => self.cancel_sale_conflict(current, payment_status).await,
                    OrderStatusType::Expired | OrderStatusType::Cancelled => {
                        warn!(
                            "🔄️💰️ Order {} received a payment but is already {}. Manual follow-up is needed.",
                            current.id, current.status
                        );
                        self.db.record_payment_status(&current.id, payment_status).await?;
                        self.alert_admin(&current).await;
                        Ok(self.refetch(&order.id).await?)
                    },
                    _ => {
                        debug!("🔄️💰️ Order {} is already {}. Nothing to do.", current.id, current.status);
                        Ok(current)
                    },
                }
            },
            InvoiceSettlement::Dead => {
                let to = OrderStatusType::Expired;
                match self.transition(&order, &[OrderStatusType::Pending], to, effects).await? {
                    Some(expired) => {
                        info!("🔄️ The invoice for order {} is dead ({payment_status}). Order expired.", expired.id);
                        Ok(expired)
                    },
                    None => Ok(self.refetch(&order.id).await?),
                }
            },
            InvoiceSettlement::Open => {
                self.db.record_payment_status(&order.id, payment_status).await?;
                Ok(self.refetch(&order.id).await?)
            },
        }
    }

    /// A paid invoice could not be applied because another order for the same listing got there first.
    async fn cancel_sale_conflict(&self, order: Order, payment_status: &str) -> Result<Order, OrderFlowError> {
        warn!("🔄️💰️ Order {} was paid, but listing {} is already sold. Cancelling.", order.id, order.listing_id);
        let effects =
            TransitionEffects::default().with_payment_status(payment_status).with_reason(SALE_CONFLICT_REASON);
        match self.transition(&order, &[OrderStatusType::Pending], OrderStatusType::Cancelled, effects).await? {
            Some(cancelled) => {
                self.alert_admin(&cancelled).await;
                Ok(cancelled)
            },
            None => Ok(self.refetch(&order.id).await?),
        }
    }

    async fn alert_admin(&self, order: &Order) {
        match &self.admin_email {
            Some(admin) => {
                let note = Notification::for_admin(NotificationTemplate::OrderConflictAdmin, order, admin);
                self.producers.publish_notification(note).await;
            },
            None => warn!("🔄️ No admin email is configured. Order {} needs attention.", order.id),
        }
    }

    async fn transition(
        &self,
        order: &Order,
        from: &[OrderStatusType],
        to: OrderStatusType,
        effects: TransitionEffects,
    ) -> Result<Option<Order>, OrderFlowError> {
        let result = self.db.try_transition(&order.id, from, to, effects).await?;
        if let Some(updated) = &result {
            let event = OrderStatusChangedEvent::new(updated.clone(), order.status);
            self.producers.publish_status_changed(event).await;
        }
        Ok(result)
    }

    async fn refetch(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }
}
