use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    events::{EventProducers, Notification, NotificationTemplate, OrderStatusChangedEvent},
    traits::{OrderStore, TransitionEffects},
    OrderFlowError,
};

/// Admin-driven lifecycle actions (delivery, completion, cancellation) and the expiry sweep.
///
/// Every action is a single guarded transition. When the guard fails the order is re-read so that the caller learns
/// why: either it does not exist, or its status does not allow the action.
pub struct FulfilmentApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for FulfilmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfilmentApi")
    }
}

impl<B> FulfilmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> FulfilmentApi<B>
where B: OrderStore
{
    /// Marks a paid order as delivered, storing the access details the buyer needs. The buyer is notified with the
    /// details. `notes` are internal and never leave the admin views.
    pub async fn deliver(
        &self,
        order_id: &OrderId,
        details: &str,
        notes: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let details = details.trim();
        if details.is_empty() {
            return Err(OrderFlowError::InvalidRequest("Delivery details are required".into()));
        }
        let effects = TransitionEffects::default().with_delivery(details.to_string(), notes);
        let from = [OrderStatusType::Paid];
        let order = self.guarded(order_id, &from, OrderStatusType::Delivered, effects, "delivered").await?;
        info!("🔄️📦️ Order {order_id} delivered");
        match order.contact_email() {
            Some(recipient) => {
                let note = Notification::for_buyer(NotificationTemplate::OrderDelivered, &order, recipient);
                self.producers.publish_notification(note).await;
            },
            None => warn!("🔄️📦️ Order {order_id} has no contact email. The buyer was not notified of delivery."),
        }
        Ok(order)
    }

    /// Closes out an order. A delivered order can be completed as is. A paid order can be completed directly only if
    /// delivery details are supplied with it. It is then delivered first, so the buyer still receives the details.
    pub async fn complete(&self, order_id: &OrderId, details: Option<&str>) -> Result<Order, OrderFlowError> {
        if let Some(d) = details.map(str::trim).filter(|d| !d.is_empty()) {
            match self.deliver(order_id, d, None).await {
                Ok(_) => {},
                Err(OrderFlowError::InvalidTransition { status: OrderStatusType::Delivered, .. }) => {
                    debug!("🔄️📦️ Order {order_id} was already delivered. Keeping the original details.");
                },
                Err(OrderFlowError::InvalidTransition { id, status, .. }) => {
                    return Err(OrderFlowError::InvalidTransition { id, status, action: "completed" });
                },
                Err(e) => return Err(e),
            }
        }
        let from = [OrderStatusType::Delivered];
        let order =
            self.guarded(order_id, &from, OrderStatusType::Completed, TransitionEffects::default(), "completed").await?;
        info!("🔄️📦️ Order {order_id} completed");
        Ok(order)
    }

    /// Cancels a pending or paid order, recording why.
    pub async fn cancel(&self, order_id: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderFlowError::InvalidRequest("A cancellation reason is required".into()));
        }
        let effects = TransitionEffects::default().with_reason(reason);
        let from = [OrderStatusType::Pending, OrderStatusType::Paid];
        let order = self.guarded(order_id, &from, OrderStatusType::Cancelled, effects, "cancelled").await?;
        info!("🔄️📦️ Order {order_id} cancelled. {reason}");
        Ok(order)
    }

    /// Expires every stale pending order in one pass. `fallback` is the maximum age of a pending order that never got
    /// an invoice expiry.
    pub async fn expire_stale_orders(&self, fallback: Duration) -> Result<Vec<Order>, OrderFlowError> {
        let expired = self.db.expire_stale_orders(Utc::now(), fallback).await?;
        for order in &expired {
            let event = OrderStatusChangedEvent::new(order.clone(), OrderStatusType::Pending);
            self.producers.publish_status_changed(event).await;
        }
        if !expired.is_empty() {
            info!("🔄️🕰️ {} stale orders expired", expired.len());
        }
        Ok(expired)
    }

    async fn guarded(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
        to: OrderStatusType,
        effects: TransitionEffects,
        action: &'static str,
    ) -> Result<Order, OrderFlowError> {
        let current =
            self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        match self.db.try_transition(order_id, from, to, effects).await? {
            Some(order) => {
                let event = OrderStatusChangedEvent::new(order.clone(), current.status);
                self.producers.publish_status_changed(event).await;
                Ok(order)
            },
            None => Err(self.explain_refusal(order_id, action).await),
        }
    }

    async fn explain_refusal(&self, order_id: &OrderId, action: &'static str) -> OrderFlowError {
        match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => {
                debug!("🔄️📦️ Order {order_id} is {} and cannot be {action}", order.status);
                OrderFlowError::InvalidTransition { id: order.id, status: order.status, action }
            },
            Ok(None) => OrderFlowError::OrderNotFound(order_id.clone()),
            Err(e) => e.into(),
        }
    }
}
