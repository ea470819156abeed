use chrono::{Duration, Utc};
use mockall::mock;
use order_engine::{
    db_types::{GatewayInvoice, InvoiceSettlement},
    traits::{ExchangeRateError, InvoiceProvider, InvoiceProviderError, NewInvoice, RateSource},
};

mock! {
    pub Gateway {}
    impl InvoiceProvider for Gateway {
        async fn create_invoice(&self, invoice: &NewInvoice) -> Result<GatewayInvoice, InvoiceProviderError>;
        async fn query_invoice(&self, external_order_id: &str) -> Result<GatewayInvoice, InvoiceProviderError>;
    }
}

mock! {
    pub Rates {}
    impl RateSource for Rates {
        async fn fetch_rate(&self, base: &str, quote: &str) -> Result<f64, ExchangeRateError>;
    }
}

pub fn invoice_for(order_id: &str, status: &str, settlement: InvoiceSettlement) -> GatewayInvoice {
    GatewayInvoice {
        invoice_id: format!("inv-{order_id}"),
        external_order_id: order_id.to_string(),
        payment_url: format!("https://pay.example/{order_id}"),
        network: Some("tron".into()),
        address: Some("TXYZ".into()),
        payment_amount: Some("100.00".into()),
        payment_status: status.to_string(),
        settlement,
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// Opens a one-hour invoice for every order. Status queries report the invoice as paid.
pub fn paying_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_invoice()
        .returning(|req| Ok(invoice_for(req.order_id.as_str(), "check", InvoiceSettlement::Open)));
    gateway.expect_query_invoice().returning(|id| Ok(invoice_for(id, "paid", InvoiceSettlement::Paid)));
    gateway
}

pub fn unreachable_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_invoice().returning(|_| Err(InvoiceProviderError::Unavailable("connection refused".into())));
    gateway.expect_query_invoice().returning(|_| Err(InvoiceProviderError::Unavailable("connection refused".into())));
    gateway
}

/// Only knows EUR to USD.
pub fn rates() -> MockRates {
    let mut rates = MockRates::new();
    rates.expect_fetch_rate().returning(|base, quote| match (base, quote) {
        ("EUR", "USD") => Ok(1.10),
        _ => Err(ExchangeRateError::SourceUnavailable(format!("No rate for {base}/{quote}"))),
    });
    rates
}
