use std::fmt::Debug;

use log::*;
use market_common::helpers::is_plausible_email;

use crate::{
    db_types::{Buyer, NewOrder, Order, OrderStatusType},
    events::{EventProducers, Notification, NotificationTemplate, OrderStatusChangedEvent},
    exchange_rate_api::ExchangeRateApi,
    order_objects::{NewOrderRequest, Requester},
    traits::{InvoiceProvider, MarketDatabase, NewInvoice, RateSource, TransitionEffects},
    OrderFlowError,
};

/// Turns purchase intents into pending orders with an open invoice.
pub struct PurchaseApi<B, G, R> {
    db: B,
    gateway: G,
    rates: ExchangeRateApi<B, R>,
    settlement_currency: String,
    producers: EventProducers,
}

impl<B, G, R> Debug for PurchaseApi<B, G, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PurchaseApi({})", self.settlement_currency)
    }
}

impl<B, G, R> PurchaseApi<B, G, R> {
    pub fn new(
        db: B,
        gateway: G,
        rates: ExchangeRateApi<B, R>,
        settlement_currency: &str,
        producers: EventProducers,
    ) -> Self {
        Self { db, gateway, rates, settlement_currency: settlement_currency.to_uppercase(), producers }
    }
}

impl<B, G, R> PurchaseApi<B, G, R>
where
    B: MarketDatabase,
    G: InvoiceProvider,
    R: RateSource,
{
    /// Creates a pending order for the listing and opens an invoice for it.
    ///
    /// Nothing is written unless the request is valid, the listing is available and the listing has not been sold.
    /// If the invoice cannot be opened, the order that was just written is cancelled with the failure as its reason
    /// and the gateway error is returned. The order is never deleted.
    pub async fn create_order(&self, request: NewOrderRequest, requester: &Requester) -> Result<Order, OrderFlowError> {
        let buyer = buyer_for_request(&request, requester)?;
        let listing_id = request.listing_id.trim();
        let listing = self
            .db
            .fetch_listing(listing_id)
            .await?
            .ok_or_else(|| OrderFlowError::ListingNotFound(listing_id.to_string()))?;
        if !listing.is_available {
            return Err(OrderFlowError::ListingUnavailable(listing.id));
        }
        if self.db.is_listing_sold(&listing.id).await? {
            return Err(OrderFlowError::ListingSold(listing.id));
        }
        let (amount, rate) = self.rates.convert(listing.price, &listing.currency, &self.settlement_currency).await?;
        if !amount.is_positive() {
            return Err(OrderFlowError::InvalidRequest(format!(
                "Listing {} costs {} {} which is nothing in {}",
                listing.id, listing.price, listing.currency, self.settlement_currency
            )));
        }
        let new_order = NewOrder::new(&listing, buyer, request.channel_access_email.trim().to_string())
            .with_settlement(amount, &self.settlement_currency, rate);
        let order = self.db.insert_order(new_order).await?;
        debug!("🔄️📦️ Order {} created for listing {} ({amount} {})", order.id, listing.id, order.currency);

        let invoice_request = NewInvoice { order_id: order.id.clone(), amount, currency: order.currency.clone() };
        let invoice = match self.gateway.create_invoice(&invoice_request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                error!("🔄️📦️ Could not open an invoice for order {}. {e}", order.id);
                let effects = TransitionEffects::default().with_reason(format!("Invoice creation failed: {e}"));
                let from = [OrderStatusType::Pending];
                match self.db.try_transition(&order.id, &from, OrderStatusType::Cancelled, effects).await {
                    Ok(Some(cancelled)) => {
                        let event = OrderStatusChangedEvent::new(cancelled, OrderStatusType::Pending);
                        self.producers.publish_status_changed(event).await;
                    },
                    Ok(None) => warn!("🔄️📦️ Order {} moved before it could be cancelled", order.id),
                    Err(e) => error!("🔄️📦️ Could not cancel orphaned order {}. The sweep will expire it. {e}", order.id),
                }
                return Err(e.into());
            },
        };
        let order = match self.db.attach_invoice(&order.id, &invoice).await? {
            Some(order) => order,
            None => self.db.fetch_order(&order.id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order.id))?,
        };
        info!("🔄️📦️ Order {} is awaiting payment on invoice {}", order.id, invoice.invoice_id);
        if let Some(recipient) = order.contact_email() {
            let note = Notification::for_buyer(NotificationTemplate::OrderCreated, &order, recipient);
            self.producers.publish_notification(note).await;
        }
        Ok(order)
    }
}

/// Validates the request and works out who the buyer is. Authenticated requesters always buy on their account.
fn buyer_for_request(request: &NewOrderRequest, requester: &Requester) -> Result<Buyer, OrderFlowError> {
    if request.listing_id.trim().is_empty() {
        return Err(OrderFlowError::InvalidRequest("A listing id is required".into()));
    }
    if !is_plausible_email(request.channel_access_email.trim()) {
        return Err(OrderFlowError::InvalidRequest("A valid channel access email is required".into()));
    }
    match requester {
        Requester::Account { user_id, email } | Requester::Admin { user_id, email } => {
            Ok(Buyer::Account { user_id: user_id.clone(), email: email.clone() })
        },
        Requester::Anonymous => {
            let email = request.guest_email.as_deref().map(str::trim).unwrap_or_default();
            if !is_plausible_email(email) {
                return Err(OrderFlowError::InvalidRequest("Guest purchases need a valid email address".into()));
            }
            let name = request.guest_name.as_deref().map(str::trim).unwrap_or_default();
            if name.is_empty() {
                return Err(OrderFlowError::InvalidRequest("Guest purchases need a name".into()));
            }
            Ok(Buyer::Guest { email: email.to_string(), name: name.to_string() })
        },
    }
}
