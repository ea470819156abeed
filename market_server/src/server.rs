use std::{collections::HashMap, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use invoice_gateway::{GatewayClient, HttpRateSource};
use log::*;
use order_engine::{
    events::EventProducers,
    ExchangeRateApi,
    FulfilmentApi,
    OrderFlowApi,
    OrderQueryApi,
    PurchaseApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{
        gateway::{GatewayInvoiceProvider, LiveRateSource},
        notifications::create_notification_event_handlers,
    },
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

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not migrate the database. {e}")))?;
    let gateway = GatewayClient::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider = GatewayInvoiceProvider::new(gateway, config.callbacks.clone(), config.invoice_lifetime_minutes);
    let rates = HttpRateSource::new(config.exchange_rates.clone())
        .map(LiveRateSource::new)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _expiry_worker = start_expiry_worker(
        FulfilmentApi::new(db.clone(), producers.clone()),
        config.order_fallback_timeout,
        config.expiry_interval,
    );
    let srv = create_server_instance(config, db, provider, rates, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: GatewayInvoiceProvider,
    rates: LiveRateSource,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let validator = TokenValidator::new(&config.auth);
    let fallback_rates: HashMap<String, f64> = config.fallback_rates.clone();
    let admin_email = config.admin_email.clone();
    info!("🚀️ Settling invoices in {}", options.settlement_currency);
    let srv = HttpServer::new(move || {
        let exchange_api = ExchangeRateApi::new(db.clone(), rates.clone(), fallback_rates.clone());
        let purchase_api = PurchaseApi::new(
            db.clone(),
            provider.clone(),
            ExchangeRateApi::new(db.clone(), rates.clone(), fallback_rates.clone()),
            &options.settlement_currency,
            producers.clone(),
        );
        let order_flow_api = OrderFlowApi::new(db.clone(), provider.clone(), producers.clone())
            .with_admin_email(admin_email.clone())
            .with_fallback_timeout(options.order_fallback_timeout);
        let fulfilment_api = FulfilmentApi::new(db.clone(), producers.clone());
        let query_api = OrderQueryApi::new(db.clone());
        let signer = provider.client().signer().clone();
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase, GatewayInvoiceProvider, LiveRateSource>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(PollOrderRoute::<SqliteDatabase, GatewayInvoiceProvider>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(ExpireOrdersRoute::<SqliteDatabase>::new())
            .service(DeliverOrderRoute::<SqliteDatabase>::new())
            .service(CompleteOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(ExchangeRateRoute::<SqliteDatabase, LiveRateSource>::new())
            .wrap(JwtMiddlewareFactory::new(validator.clone()));
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(purchase_api))
            .app_data(web::Data::new(order_flow_api))
            .app_data(web::Data::new(fulfilment_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(exchange_api))
            .app_data(web::Data::new(signer))
            .app_data(web::Data::new(options.clone()))
            .service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase, GatewayInvoiceProvider>::new())
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
