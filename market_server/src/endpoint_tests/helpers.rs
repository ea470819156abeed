use std::collections::HashMap;

use actix_web::{body, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App, ResponseError};
use chrono::{Duration, Utc};
use invoice_gateway::PayloadSigner;
use jsonwebtoken::{encode, EncodingKey, Header};
use log::debug;
use market_common::Secret;
use order_engine::{
    db_types::{Order, OrderId},
    events::EventProducers,
    order_objects::{NewOrderRequest, OrderQueryFilter},
    test_utils::prepare_env::{prepare_test_env, seed_listings},
    traits::OrderStore,
    ExchangeRateApi,
    FulfilmentApi,
    OrderFlowApi,
    OrderQueryApi,
    PurchaseApi,
    SqliteDatabase,
};
use serde_json::Value;
use tempfile::TempDir;

use super::mocks::{rates, MockGateway, MockRates};
use crate::{
    auth::{JwtClaims, Role, TokenValidator},
    config::{AuthConfig, ServerOptions},
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        CancelOrderRoute,
        CompleteOrderRoute,
        CreateOrderRoute,
        DeliverOrderRoute,
        ExchangeRateRoute,
        ExpireOrdersRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        PaymentWebhookRoute,
        PollOrderRoute,
        SearchOrdersRoute,
    },
};

// DO NOT re-use these secrets anywhere.
pub const JWT_SECRET: &str = "endpoint-tests-jwt-secret-do-not-use-anywhere";
pub const GATEWAY_KEY: &str = "endpoint-tests-gateway-api-key";
pub const ADMIN_EMAIL: &str = "admin@market.example";

pub fn issue_token(user_id: &str, email: &str, roles: Vec<Role>) -> String {
    let claims = JwtClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        roles,
        exp: (Utc::now() + Duration::days(1)).timestamp() as usize,
    };
    let key = EncodingKey::from_secret(JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).expect("Failed to sign token")
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

pub fn user_token() -> String {
    issue_token("alice", "alice@example.com", vec![Role::User])
}

pub fn admin_token() -> String {
    issue_token("root", ADMIN_EMAIL, vec![Role::User, Role::Admin])
}

pub fn signer() -> PayloadSigner {
    PayloadSigner::new(Secret::new(GATEWAY_KEY.to_string()))
}

pub fn guest_purchase(listing_id: &str, email: &str) -> NewOrderRequest {
    NewOrderRequest {
        listing_id: listing_id.into(),
        channel_access_email: "channel-owner@example.com".into(),
        guest_email: Some(email.into()),
        guest_name: Some("Guest Buyer".into()),
    }
}

/// A seeded database in its own temporary directory. The directory is removed when this is dropped.
pub struct TestMarket {
    pub db: SqliteDatabase,
    _dir: TempDir,
}

impl TestMarket {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Could not create temporary directory");
        let url = format!("sqlite://{}", dir.path().join("market.db").display());
        let db = prepare_test_env(&url).await;
        seed_listings(&db).await;
        Self { db, _dir: dir }
    }

    /// Wires up every route against this database. `purchase_gateway` issues invoices and `flow_gateway` answers
    /// polls.
    pub fn configure(
        &self,
        purchase_gateway: MockGateway,
        flow_gateway: MockGateway,
    ) -> impl FnOnce(&mut ServiceConfig) + 'static {
        let db = self.db.clone();
        move |cfg: &mut ServiceConfig| {
            let producers = EventProducers::default();
            let options =
                ServerOptions { settlement_currency: "USD".into(), order_fallback_timeout: Duration::hours(2) };
            let purchase_api = PurchaseApi::new(
                db.clone(),
                purchase_gateway,
                ExchangeRateApi::new(db.clone(), rates(), HashMap::new()),
                "USD",
                producers.clone(),
            );
            let flow_api = OrderFlowApi::new(db.clone(), flow_gateway, producers.clone())
                .with_admin_email(Some(ADMIN_EMAIL.into()))
                .with_fallback_timeout(options.order_fallback_timeout);
            let exchange_api = ExchangeRateApi::new(db.clone(), rates(), HashMap::from([("GBP".to_string(), 1.25)]));
            let validator = TokenValidator::new(&AuthConfig::new(JWT_SECRET));
            cfg.app_data(web::Data::new(purchase_api))
                .app_data(web::Data::new(flow_api))
                .app_data(web::Data::new(FulfilmentApi::new(db.clone(), producers)))
                .app_data(web::Data::new(OrderQueryApi::new(db.clone())))
                .app_data(web::Data::new(exchange_api))
                .app_data(web::Data::new(signer()))
                .app_data(web::Data::new(options))
                .service(health)
                .service(PaymentWebhookRoute::<SqliteDatabase, MockGateway>::new())
                .service(
                    web::scope("/api")
                        .service(CreateOrderRoute::<SqliteDatabase, MockGateway, MockRates>::new())
                        .service(MyOrdersRoute::<SqliteDatabase>::new())
                        .service(OrderByIdRoute::<SqliteDatabase>::new())
                        .service(PollOrderRoute::<SqliteDatabase, MockGateway>::new())
                        .service(SearchOrdersRoute::<SqliteDatabase>::new())
                        .service(ExpireOrdersRoute::<SqliteDatabase>::new())
                        .service(DeliverOrderRoute::<SqliteDatabase>::new())
                        .service(CompleteOrderRoute::<SqliteDatabase>::new())
                        .service(CancelOrderRoute::<SqliteDatabase>::new())
                        .service(ExchangeRateRoute::<SqliteDatabase, MockRates>::new())
                        .wrap(JwtMiddlewareFactory::new(validator)),
                );
        }
    }

    pub async fn orders_for_listing(&self, listing_id: &str) -> Vec<Order> {
        let filter = OrderQueryFilter::default().with_listing_id(listing_id);
        self.db.search_orders(filter).await.expect("Database error")
    }

    pub async fn fetch(&self, id: &str) -> Order {
        self.db.fetch_order(&OrderId::from(id.to_string())).await.expect("Database error").expect("Order not found")
    }
}

/// Sends the request through a freshly built app and returns the status and body. Errors raised by middleware are
/// rendered the same way the server would render them.
pub async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) + 'static {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.as_response_error().error_response(),
    };
    let status = res.status();
    let bytes = body::to_bytes(res.into_body()).await.expect("Could not read response body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
