//! Glue between the crypto payment gateway client and the engine's provider traits.
//!
//! The engine knows nothing about the gateway's vocabulary. Everything gateway-specific (callback URLs, invoice
//! lifetime, status strings) is resolved here.
use invoice_gateway::{
    GatewayClient,
    GatewayError,
    HttpRateSource,
    Invoice,
    InvoiceRequest,
    PaymentStatus,
    Settlement,
    WebhookNotification,
};
use log::*;
use order_engine::{
    db_types::{GatewayInvoice, InvoiceSettlement, PaymentUpdate},
    traits::{ExchangeRateError, InvoiceProvider, InvoiceProviderError, NewInvoice, RateSource},
};

use crate::config::CallbackUrls;

#[derive(Clone)]
pub struct GatewayInvoiceProvider {
    client: GatewayClient,
    callbacks: CallbackUrls,
    lifetime_minutes: u32,
}

impl GatewayInvoiceProvider {
    pub fn new(client: GatewayClient, callbacks: CallbackUrls, lifetime_minutes: u32) -> Self {
        Self { client, callbacks, lifetime_minutes }
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }
}

impl InvoiceProvider for GatewayInvoiceProvider {
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<GatewayInvoice, InvoiceProviderError> {
        let request = InvoiceRequest {
            amount: invoice.amount,
            currency: invoice.currency.clone(),
            order_id: invoice.order_id.to_string(),
            url_return: self.callbacks.return_url_for(&invoice.order_id),
            url_success: self.callbacks.success_url_for(&invoice.order_id),
            url_callback: self.callbacks.callback_url_for(&invoice.order_id),
            lifetime_minutes: self.lifetime_minutes,
        };
        debug!("💻️ Requesting an invoice for order {}", invoice.order_id);
        let result = self.client.create_invoice(&request).await.map_err(provider_error)?;
        Ok(gateway_invoice(result))
    }

    async fn query_invoice(&self, external_order_id: &str) -> Result<GatewayInvoice, InvoiceProviderError> {
        let result = self.client.query_invoice(external_order_id).await.map_err(provider_error)?;
        Ok(gateway_invoice(result))
    }
}

pub fn provider_error(e: GatewayError) -> InvoiceProviderError {
    match e {
        GatewayError::InvalidRequest(s) | GatewayError::InvalidCurrencyAmount(s) => {
            InvoiceProviderError::InvalidRequest(s)
        },
        GatewayError::Initialization(s) | GatewayError::RequestFailed(s) => InvoiceProviderError::Unavailable(s),
        GatewayError::QueryError { status, message } if status >= 500 => {
            InvoiceProviderError::Unavailable(format!("{status}: {message}"))
        },
        GatewayError::QueryError { status, message } => {
            InvoiceProviderError::InvalidRequest(format!("{status}: {message}"))
        },
        other => InvoiceProviderError::InvalidResponse(other.to_string()),
    }
}

pub fn settlement_of(status: PaymentStatus) -> InvoiceSettlement {
    match status.settlement() {
        Settlement::Paid => InvoiceSettlement::Paid,
        Settlement::Failed => InvoiceSettlement::Dead,
        Settlement::Unsettled => InvoiceSettlement::Open,
    }
}

fn gateway_invoice(invoice: Invoice) -> GatewayInvoice {
    GatewayInvoice {
        invoice_id: invoice.invoice_id,
        external_order_id: invoice.order_id,
        payment_url: invoice.payment_url,
        network: invoice.network,
        address: invoice.address,
        payment_amount: invoice.payment_amount,
        payment_status: invoice.payment_status.to_string(),
        settlement: settlement_of(invoice.payment_status),
        expires_at: invoice.expires_at,
    }
}

/// Strips an authenticated webhook down to what reconciliation needs.
pub fn payment_update(notification: WebhookNotification) -> PaymentUpdate {
    PaymentUpdate {
        external_order_id: notification.order_id,
        invoice_id: notification.invoice_id,
        payment_status: notification.status.to_string(),
        settlement: settlement_of(notification.status),
    }
}

//-------------------------------------------  LiveRateSource  -------------------------------------------------------
#[derive(Clone)]
pub struct LiveRateSource(HttpRateSource);

impl LiveRateSource {
    pub fn new(source: HttpRateSource) -> Self {
        Self(source)
    }
}

impl RateSource for LiveRateSource {
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<f64, ExchangeRateError> {
        self.0.fetch_rate(base, quote).await.map_err(|e| ExchangeRateError::SourceUnavailable(e.to_string()))
    }
}
