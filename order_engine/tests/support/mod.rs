#![allow(dead_code)]
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::*;
use mockall::mock;
use order_engine::{
    db_types::{GatewayInvoice, InvoiceSettlement, OrderStatusType},
    events::{EventProducer, EventProducers, Notification, OrderStatusChangedEvent},
    order_objects::{NewOrderRequest, Requester},
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_listings},
    traits::{ExchangeRateError, InvoiceProvider, InvoiceProviderError, NewInvoice, OrderStore, RateSource},
    ExchangeRateApi,
    FulfilmentApi,
    OrderFlowApi,
    OrderQueryApi,
    PurchaseApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::sync::mpsc;

pub const ADMIN_EMAIL: &str = "admin@market.example";

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

/// An invoice as the gateway would describe it for `order_id`.
pub fn invoice_for(
    order_id: &str,
    status: &str,
    settlement: InvoiceSettlement,
    expires_at: DateTime<Utc>,
) -> GatewayInvoice {
    GatewayInvoice {
        invoice_id: format!("inv-{order_id}"),
        external_order_id: order_id.to_string(),
        payment_url: format!("https://pay.example/{order_id}"),
        network: Some("tron".into()),
        address: Some("TXYZ".into()),
        payment_amount: Some("100.00".into()),
        payment_status: status.to_string(),
        settlement,
        expires_at,
    }
}

/// A gateway that opens a one-hour invoice for every order.
pub fn open_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_invoice().returning(|req| {
        Ok(invoice_for(req.order_id.as_str(), "check", InvoiceSettlement::Open, Utc::now() + Duration::hours(1)))
    });
    gateway
}

/// A gateway that cannot be reached.
pub fn unreachable_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_invoice().returning(|_| Err(InvoiceProviderError::Unavailable("connection refused".into())));
    gateway.expect_query_invoice().returning(|_| Err(InvoiceProviderError::Unavailable("connection refused".into())));
    gateway
}

/// A gateway whose invoices all report `status`.
pub fn gateway_reporting(status: &'static str, settlement: InvoiceSettlement) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_query_invoice()
        .returning(move |id| Ok(invoice_for(id, status, settlement, Utc::now() + Duration::hours(1))));
    gateway
}

/// A rate source that only knows EUR and VND to USD.
pub fn rates() -> MockRates {
    let mut rates = MockRates::new();
    rates.expect_fetch_rate().returning(|base, quote| match (base, quote) {
        ("EUR", "USD") => Ok(1.10),
        ("VND", "USD") => Ok(0.00004),
        _ => Err(ExchangeRateError::SourceUnavailable(format!("No rate for {base}/{quote}"))),
    });
    rates
}

/// Collects everything the engine publishes, so that tests can inspect it afterwards.
pub struct EventLog {
    notifications: mpsc::Receiver<Notification>,
    status_changes: mpsc::Receiver<OrderStatusChangedEvent>,
}

impl EventLog {
    pub fn new() -> (Self, EventProducers) {
        let (ntx, notifications) = mpsc::channel(256);
        let (stx, status_changes) = mpsc::channel(256);
        let producers = EventProducers {
            notification_producer: vec![EventProducer::new(ntx)],
            status_changed_producer: vec![EventProducer::new(stx)],
        };
        (Self { notifications, status_changes }, producers)
    }

    pub fn notifications(&mut self) -> Vec<Notification> {
        let mut result = vec![];
        while let Ok(n) = self.notifications.try_recv() {
            result.push(n);
        }
        result
    }

    /// `(old, new)` status pairs in the order they were published.
    pub fn status_changes(&mut self) -> Vec<(OrderStatusType, OrderStatusType)> {
        let mut result = vec![];
        while let Ok(ev) = self.status_changes.try_recv() {
            result.push((ev.old_status, ev.order.status));
        }
        result
    }
}

pub struct Market {
    pub db: SqliteDatabase,
    pub purchases: PurchaseApi<SqliteDatabase, MockGateway, MockRates>,
    pub flow: OrderFlowApi<SqliteDatabase, MockGateway>,
    pub fulfilment: FulfilmentApi<SqliteDatabase>,
    pub queries: OrderQueryApi<SqliteDatabase>,
    pub events: EventLog,
}

/// A fresh database with seeded listings and every API wired up. `purchase_gateway` opens invoices and
/// `poll_gateway` answers status polls.
pub async fn setup_with(purchase_gateway: MockGateway, poll_gateway: MockGateway) -> Market {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    seed_listings(&db).await;
    let (events, producers) = EventLog::new();
    let rate_api = ExchangeRateApi::new(db.clone(), rates(), HashMap::new());
    let purchases = PurchaseApi::new(db.clone(), purchase_gateway, rate_api, "USD", producers.clone());
    let flow = OrderFlowApi::new(db.clone(), poll_gateway, producers.clone())
        .with_admin_email(Some(ADMIN_EMAIL.into()))
        .with_fallback_timeout(Duration::hours(2));
    let fulfilment = FulfilmentApi::new(db.clone(), producers);
    let queries = OrderQueryApi::new(db.clone());
    Market { db, purchases, flow, fulfilment, queries, events }
}

pub async fn setup() -> Market {
    setup_with(open_gateway(), unreachable_gateway()).await
}

pub async fn tear_down(market: Market) {
    let url = market.db.url().to_string();
    let mut db = market.db;
    if let Err(e) = db.close().await {
        warn!("🚀️ Could not close test database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop test database {url}: {e}");
    }
}

pub fn alice() -> Requester {
    Requester::Account { user_id: "alice".into(), email: "alice@example.com".into() }
}

pub fn bob() -> Requester {
    Requester::Account { user_id: "bob".into(), email: "bob@example.com".into() }
}

pub fn admin() -> Requester {
    Requester::Admin { user_id: "root".into(), email: ADMIN_EMAIL.into() }
}

pub fn account_purchase(listing_id: &str) -> NewOrderRequest {
    NewOrderRequest {
        listing_id: listing_id.into(),
        channel_access_email: "channel-owner@example.com".into(),
        guest_email: None,
        guest_name: None,
    }
}

pub fn guest_purchase(listing_id: &str, email: &str) -> NewOrderRequest {
    NewOrderRequest {
        listing_id: listing_id.into(),
        channel_access_email: "channel-owner@example.com".into(),
        guest_email: Some(email.into()),
        guest_name: Some("Guest Buyer".into()),
    }
}
