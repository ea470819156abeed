use market_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{GatewayInvoice, OrderId},
    traits::ExchangeRateError,
};

#[derive(Debug, Clone, Error)]
pub enum InvoiceProviderError {
    #[error("The invoice request was rejected: {0}")]
    InvalidRequest(String),
    #[error("The payment provider could not be reached: {0}")]
    Unavailable(String),
    #[error("The payment provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// The parts of an invoice that depend on the order. Callback URLs and the invoice lifetime are the provider's own
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub amount: Cents,
    pub currency: String,
}

/// A payment provider that issues invoices.
#[allow(async_fn_in_trait)]
pub trait InvoiceProvider {
    /// Opens an invoice for the order. Any failure is a hard error; the caller decides what happens to the order.
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<GatewayInvoice, InvoiceProviderError>;

    /// Fetches the provider's current view of the invoice opened under `external_order_id`.
    async fn query_invoice(&self, external_order_id: &str) -> Result<GatewayInvoice, InvoiceProviderError>;
}

/// A live exchange rate feed.
#[allow(async_fn_in_trait)]
pub trait RateSource {
    /// How many units of `quote` one unit of `base` buys.
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<f64, ExchangeRateError>;
}
