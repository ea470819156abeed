use std::fmt::Display;

use chrono::{DateTime, Utc};
use market_common::Cents;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, OrderStatusType};

//--------------------------------------      Requester        ---------------------------------------------------------
/// Who is asking. Identities come from the session system and are trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    Account { user_id: String, email: String },
    Admin { user_id: String, email: String },
}

impl Requester {
    pub fn is_admin(&self) -> bool {
        matches!(self, Requester::Admin { .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Requester::Anonymous => None,
            Requester::Account { user_id, .. } | Requester::Admin { user_id, .. } => Some(user_id),
        }
    }
}

//--------------------------------------     Access guard      ---------------------------------------------------------
/// The outcome of asking to read an order.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderAccess {
    /// The requester bought the order, or proved they did. Only the buyer projection may be shown.
    Buyer(Order),
    /// Full view, internal notes included.
    Admin(Order),
    /// A guest order exists under this id, but no matching email was supplied. A wrong email lands here too.
    EmailRequired,
    /// No order exists under this id, or it belongs to another account.
    NotFound,
}

impl OrderAccess {
    pub fn order(&self) -> Option<&Order> {
        match self {
            OrderAccess::Buyer(o) | OrderAccess::Admin(o) => Some(o),
            _ => None,
        }
    }

    /// Same access decision, applied to a newer copy of the order.
    pub fn with_order(self, order: Order) -> Self {
        match self {
            OrderAccess::Buyer(_) => OrderAccess::Buyer(order),
            OrderAccess::Admin(_) => OrderAccess::Admin(order),
            other => other,
        }
    }
}

/// Decides who may read an order.
///
/// 1. An authenticated requester whose user id is the buyer's is granted.
/// 2. Admins are always granted.
/// 3. An anonymous requester who supplies exactly the guest email stored on a guest order is granted.
/// 4. Anything else is denied. Guest orders answer [`OrderAccess::EmailRequired`], whether the email was missing or
///    wrong, so that a guess reveals nothing. Account orders answer [`OrderAccess::NotFound`].
pub fn check_access(order: Option<Order>, requester: &Requester, email: Option<&str>) -> OrderAccess {
    let Some(order) = order else {
        return OrderAccess::NotFound;
    };
    if requester.is_admin() {
        return OrderAccess::Admin(order);
    }
    match (&order.user_id, requester) {
        (Some(owner), r) if r.user_id() == Some(owner.as_str()) => OrderAccess::Buyer(order),
        (Some(_), _) => OrderAccess::NotFound,
        (None, Requester::Anonymous) => match (email, order.guest_email.as_deref()) {
            (Some(supplied), Some(stored)) if supplied == stored => OrderAccess::Buyer(order),
            _ => OrderAccess::EmailRequired,
        },
        (None, _) => OrderAccess::EmailRequired,
    }
}

//--------------------------------------    BuyerOrderView     ---------------------------------------------------------
/// What a buyer sees of their order. Internal notes and admin-only fields are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerOrderView {
    pub id: OrderId,
    pub listing_id: String,
    pub status: OrderStatusType,
    pub channel_access_email: String,
    pub original_price: Cents,
    pub original_currency: String,
    pub amount: Cents,
    pub currency: String,
    pub exchange_rate: f64,
    pub payment_url: Option<String>,
    pub payment_network: Option<String>,
    pub payment_address: Option<String>,
    pub payment_amount: Option<String>,
    pub payment_status: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub delivery_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for BuyerOrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            listing_id: order.listing_id,
            status: order.status,
            channel_access_email: order.channel_access_email,
            original_price: order.original_price,
            original_currency: order.original_currency,
            amount: order.amount,
            currency: order.currency,
            exchange_rate: order.exchange_rate,
            payment_url: order.payment_url,
            payment_network: order.payment_network,
            payment_address: order.payment_address,
            payment_amount: order.payment_amount,
            payment_status: order.payment_status,
            expires_at: order.expires_at,
            delivery_details: order.delivery_details,
            created_at: order.created_at,
            paid_at: order.paid_at,
            delivered_at: order.delivered_at,
            completed_at: order.completed_at,
        }
    }
}

//--------------------------------------    NewOrderRequest    ---------------------------------------------------------
/// A purchase intent. Guest fields are ignored for authenticated buyers and required otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub listing_id: String,
    pub channel_access_email: String,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
}

//--------------------------------------   OrderQueryFilter    ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub listing_id: Option<String>,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_listing_id<S: Into<String>>(mut self, listing_id: S) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_guest_email<S: Into<String>>(mut self, email: S) -> Self {
        self.guest_email = Some(email.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        match &mut self.status {
            Some(statuses) => statuses.push(status),
            None => self.status = Some(vec![status]),
        }
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.listing_id.is_none() &&
            self.user_id.is_none() &&
            self.guest_email.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.as_ref().map_or(true, |s| s.is_empty())
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = vec![];
        if let Some(listing_id) = &self.listing_id {
            parts.push(format!("listing_id: {listing_id}"));
        }
        if let Some(user_id) = &self.user_id {
            parts.push(format!("user_id: {user_id}"));
        }
        if self.guest_email.is_some() {
            parts.push("guest_email: <set>".to_string());
        }
        if let Some(since) = &self.since {
            parts.push(format!("since: {since}"));
        }
        if let Some(until) = &self.until {
            parts.push(format!("until: {until}"));
        }
        if let Some(status) = &self.status {
            let s = status.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            parts.push(format!("status: {s}"));
        }
        if parts.is_empty() {
            f.write_str("All orders")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}
