use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::db_types::{Order, OrderStatusType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    /// Sent to the buyer when the order and its invoice are created
    OrderCreated,
    /// Sent to the admin address when an order is paid
    OrderPaidAdmin,
    /// Sent to the buyer when the channel has been handed over
    OrderDelivered,
    /// Sent to the admin address when a paid invoice could not be applied because the listing was already sold
    OrderConflictAdmin,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order_created",
            Self::OrderPaidAdmin => "order_paid_admin",
            Self::OrderDelivered => "order_delivered",
            Self::OrderConflictAdmin => "order_conflict_admin",
        }
    }
}

impl Display for NotificationTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fire-and-forget message for the outbound mail system, keyed by template and recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub recipient: String,
    pub params: Map<String, Value>,
}

impl Notification {
    /// A notification carrying only the fields a buyer may see. Internal delivery notes are never included.
    pub fn for_buyer(template: NotificationTemplate, order: &Order, recipient: &str) -> Self {
        let mut params = public_params(order);
        if let Some(name) = &order.guest_name {
            params.insert("buyerName".into(), json!(name));
        }
        if let Some(url) = &order.payment_url {
            params.insert("paymentUrl".into(), json!(url));
        }
        if template == NotificationTemplate::OrderDelivered {
            params.insert("deliveryDetails".into(), json!(order.delivery_details));
        }
        Self { template, recipient: recipient.to_string(), params }
    }

    pub fn for_admin(template: NotificationTemplate, order: &Order, recipient: &str) -> Self {
        let mut params = public_params(order);
        params.insert("buyerEmail".into(), json!(order.contact_email()));
        params.insert("channelAccessEmail".into(), json!(order.channel_access_email));
        if let Some(reason) = &order.status_reason {
            params.insert("reason".into(), json!(reason));
        }
        Self { template, recipient: recipient.to_string(), params }
    }
}

fn public_params(order: &Order) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("orderId".into(), json!(order.id));
    params.insert("listingId".into(), json!(order.listing_id));
    params.insert("amount".into(), json!(order.amount.to_fixed_string()));
    params.insert("currency".into(), json!(order.currency));
    params.insert("status".into(), json!(order.status));
    params
}

/// Emitted whenever a status change is applied, whichever trigger caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}
