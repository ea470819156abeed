use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use market_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------       OrderId         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// A fresh, random (v4 UUID) order id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order exists and an invoice has been (or is being) issued. Nothing has been paid yet.
    Pending,
    /// The gateway has confirmed payment in full.
    Paid,
    /// An admin has handed the channel over to the buyer.
    Delivered,
    /// The sale is closed.
    Completed,
    /// The invoice ran out of time before it was paid.
    Expired,
    /// The order was cancelled by an admin, or automatically after a failure or a sale conflict.
    Cancelled,
}

impl OrderStatusType {
    pub const SOLD: [OrderStatusType; 3] =
        [OrderStatusType::Paid, OrderStatusType::Delivered, OrderStatusType::Completed];

    /// The forward-only state machine. Every status change in the system must pass this check.
    ///
    /// | From \ To  | paid | delivered | completed | expired | cancelled |
    /// |------------|------|-----------|-----------|---------|-----------|
    /// | pending    | ✔    |           |           | ✔       | ✔         |
    /// | paid       |      | ✔         | ✔         |         | ✔         |
    /// | delivered  |      |           | ✔         |         |           |
    ///
    /// `completed`, `expired` and `cancelled` are terminal. Nothing ever returns to `pending`.
    pub fn can_transition_to(&self, to: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, to),
            (Pending, Paid) |
                (Pending, Expired) |
                (Pending, Cancelled) |
                (Paid, Delivered) |
                (Paid, Completed) |
                (Paid, Cancelled) |
                (Delivered, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Cancelled)
    }

    pub fn is_sold(&self) -> bool {
        Self::SOLD.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "delivered" => Ok(Self::Delivered),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Buyer          ---------------------------------------------------------
/// Who is paying for an order. Exactly one kind of buyer is recorded against every order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Buyer {
    Account { user_id: String, email: String },
    Guest { email: String, name: String },
}

impl Buyer {
    /// Where notifications for this buyer go.
    pub fn contact_email(&self) -> &str {
        match self {
            Buyer::Account { email, .. } => email,
            Buyer::Guest { email, .. } => email,
        }
    }
}

//--------------------------------------       Listing         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: Cents,
    pub currency: String,
    pub is_available: bool,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub listing_id: String,
    pub buyer: Buyer,
    pub channel_access_email: String,
    pub original_price: Cents,
    pub original_currency: String,
    pub amount: Cents,
    pub currency: String,
    pub exchange_rate: f64,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(listing: &Listing, buyer: Buyer, channel_access_email: String) -> Self {
        Self {
            id: OrderId::random(),
            listing_id: listing.id.clone(),
            buyer,
            channel_access_email,
            original_price: listing.price,
            original_currency: listing.currency.clone(),
            amount: listing.price,
            currency: listing.currency.clone(),
            exchange_rate: 1.0,
            created_at: Utc::now(),
        }
    }

    pub fn with_settlement(mut self, amount: Cents, currency: &str, exchange_rate: f64) -> Self {
        self.amount = amount;
        self.currency = currency.to_string();
        self.exchange_rate = exchange_rate;
        self
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub listing_id: String,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub channel_access_email: String,
    pub original_price: Cents,
    pub original_currency: String,
    pub amount: Cents,
    pub currency: String,
    pub exchange_rate: f64,
    pub gateway_invoice_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub payment_url: Option<String>,
    pub payment_network: Option<String>,
    pub payment_address: Option<String>,
    pub payment_amount: Option<String>,
    pub payment_status: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: OrderStatusType,
    pub status_reason: Option<String>,
    pub delivery_details: Option<String>,
    pub delivery_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn buyer(&self) -> Option<Buyer> {
        match (&self.user_id, &self.guest_email) {
            (Some(user_id), None) => {
                Some(Buyer::Account { user_id: user_id.clone(), email: self.user_email.clone().unwrap_or_default() })
            },
            (None, Some(email)) => {
                Some(Buyer::Guest { email: email.clone(), name: self.guest_name.clone().unwrap_or_default() })
            },
            _ => None,
        }
    }

    /// The address the buyer receives notifications on: the account email snapshot, or the guest email.
    pub fn contact_email(&self) -> Option<&str> {
        self.user_email.as_deref().or(self.guest_email.as_deref())
    }

    pub fn is_guest_order(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn has_invoice(&self) -> bool {
        self.gateway_order_id.is_some() || self.gateway_invoice_id.is_some()
    }
}

//--------------------------------------    GatewayInvoice     ---------------------------------------------------------
/// What a payment provider tells us about an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceSettlement {
    /// Paid in full. The order can be marked paid.
    Paid,
    /// The invoice can never be paid (failed, cancelled or expired at the provider).
    Dead,
    /// Still open.
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInvoice {
    pub invoice_id: String,
    pub external_order_id: String,
    pub payment_url: String,
    pub network: Option<String>,
    pub address: Option<String>,
    pub payment_amount: Option<String>,
    /// The provider's own status string. Informational only.
    pub payment_status: String,
    pub settlement: InvoiceSettlement,
    pub expires_at: DateTime<Utc>,
}

/// An authenticated payment notification, stripped down to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub external_order_id: String,
    pub invoice_id: String,
    pub payment_status: String,
    pub settlement: InvoiceSettlement,
}

//--------------------------------------     ExchangeRate      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base_currency: String,
    pub quote_currency: String,
    /// Units of `quote_currency` bought by one unit of `base_currency`.
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(base_currency: &str, quote_currency: &str, rate: f64) -> Self {
        Self {
            base_currency: base_currency.to_uppercase(),
            quote_currency: quote_currency.to_uppercase(),
            rate,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use OrderStatusType::*;

    const ALL: [OrderStatusType; 6] = [Pending, Paid, Delivered, Completed, Expired, Cancelled];

    #[test]
    fn nothing_returns_to_pending_and_terminals_are_final() {
        for from in ALL {
            assert!(!from.can_transition_to(Pending), "{from} -> pending must be impossible");
            if from.is_terminal() {
                for to in ALL {
                    assert!(!from.can_transition_to(to), "{from} is terminal but may move to {to}");
                }
            }
        }
    }

    #[test]
    fn state_machine_edges() {
        let allowed = [
            (Pending, Paid),
            (Pending, Expired),
            (Pending, Cancelled),
            (Paid, Delivered),
            (Paid, Completed),
            (Paid, Cancelled),
            (Delivered, Completed),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(from.can_transition_to(to), allowed.contains(&(from, to)), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn status_strings() {
        for s in ALL {
            assert_eq!(s.as_str().parse::<OrderStatusType>().unwrap(), s);
        }
        assert!("New".parse::<OrderStatusType>().is_err());
        assert_eq!(serde_json::to_string(&Delivered).unwrap(), "\"delivered\"");
    }

    #[test]
    fn order_ids() {
        let a = OrderId::random();
        let b = OrderId::random();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert!("  ".parse::<OrderId>().is_err());
    }
}
