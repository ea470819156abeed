//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use invoice_gateway::{GatewayError, PayloadSigner};
use log::*;
use order_engine::{
    db_types::{Order, OrderId},
    order_objects::{BuyerOrderView, NewOrderRequest, OrderAccess, OrderQueryFilter},
    traits::{ExchangeRates, InvoiceProvider, MarketDatabase, OrderStore, RateSource},
    ExchangeRateApi,
    FulfilmentApi,
    OrderFlowApi,
    OrderQueryApi,
    PurchaseApi,
};

use crate::{
    auth::{Identity, Role},
    config::ServerOptions,
    data_objects::{
        CancelOrderParams,
        CompleteOrderParams,
        DeliverOrderParams,
        EmailParam,
        ExchangeRateResult,
        ExpiryResult,
        JsonResponse,
        OrderSearchParams,
    },
    errors::ServerError,
    integrations::gateway::payment_update,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl MarketDatabase, InvoiceProvider, RateSource);
/// Purchase intent.
///
/// Signed-in buyers only send the listing id and the channel access email. Guests must also send `guestEmail` and
/// `guestName`. On success the order is pending and carries the payment URL the buyer must be sent to.
///
/// ## Returns
/// * 201 with the buyer's view of the order
/// * 400 if the request is incomplete, 404 for unknown listings, 409 if the listing is withdrawn or already sold
/// * 502 if the gateway would not issue an invoice. The order is cancelled in that case.
pub async fn create_order<B, G, R>(
    identity: Identity,
    body: web::Json<NewOrderRequest>,
    api: web::Data<PurchaseApi<B, G, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketDatabase,
    G: InvoiceProvider,
    R: RateSource,
{
    let request = body.into_inner();
    debug!("💻️ POST new order for listing {}", request.listing_id);
    let order = api.create_order(request, identity.requester()).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(BuyerOrderView::from(order)))
}

route!(my_orders => Get "/orders" impl OrderStore where requires [Role::User]);
/// All orders placed by the signed-in user, newest first.
pub async fn my_orders<B: OrderStore>(
    identity: Identity,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = identity
        .requester()
        .user_id()
        .ok_or_else(|| ServerError::Unspecified("Signed-in request without a user id".to_string()))?
        .to_string();
    debug!("💻️ GET orders for user {user_id}");
    let orders = api.orders_for_user(&user_id).await?;
    let orders = orders.into_iter().map(BuyerOrderView::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderStore);
/// Use `/orders/{order_id}` to fetch a specific order.
///
/// Signed-in buyers see their own orders. Guests add `?email=` with the address they ordered with. Admins see every
/// order in full. Anyone else gets a 404, or a 403 with `emailRequired` for guest orders without the email.
pub async fn order_by_id<B: OrderStore>(
    identity: Identity,
    path: web::Path<OrderId>,
    query: web::Query<EmailParam>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    let access = api.fetch_order_for(&order_id, identity.requester(), query.email()).await?;
    access_response(&order_id, access)
}

route!(poll_order => Post "/orders/{order_id}/poll" impl OrderStore, InvoiceProvider);
/// Asks the gateway for the latest invoice status and applies it, then returns the order like `order_by_id` does.
pub async fn poll_order<B, G>(
    identity: Identity,
    path: web::Path<OrderId>,
    query: web::Query<EmailParam>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: InvoiceProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ POST poll for order {order_id}");
    let access = api.poll_order(&order_id, identity.requester(), query.email()).await?;
    access_response(&order_id, access)
}

fn access_response(order_id: &OrderId, access: OrderAccess) -> Result<HttpResponse, ServerError> {
    match access {
        OrderAccess::Buyer(order) => Ok(HttpResponse::Ok().json(BuyerOrderView::from(order))),
        OrderAccess::Admin(order) => Ok(HttpResponse::Ok().json(order)),
        OrderAccess::EmailRequired => Err(ServerError::EmailRequired),
        OrderAccess::NotFound => Err(ServerError::NoRecordFound(format!("Order {order_id}"))),
    }
}

// ----------------------------------------------   Webhook  ---------------------------------------------------
route!(payment_webhook => Post "/webhook/payment" impl OrderStore, InvoiceProvider);
/// Payment notifications from the gateway.
///
/// The body is checked against its embedded signature before anything in it is trusted. Redelivered notifications
/// are acknowledged with a 200 and change nothing.
///
/// ## Returns
/// * 200 once the notification is applied (or was already applied)
/// * 400 if the body is not a well-formed notification
/// * 401 if the signature does not match
/// * 404 if the notification does not refer to any order
pub async fn payment_webhook<B, G>(
    body: web::Bytes,
    signer: web::Data<PayloadSigner>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    G: InvoiceProvider,
{
    trace!("💻️ Received payment webhook ({} bytes)", body.len());
    let notification = signer.authenticate_webhook(&body).map_err(|e| match e {
        GatewayError::InvalidSignature | GatewayError::MissingSignature => {
            warn!("💻️ Rejected a payment webhook with an invalid signature");
            ServerError::InvalidSignature
        },
        e => {
            warn!("💻️ Could not read a payment webhook. {e}");
            ServerError::InvalidRequestBody(e.to_string())
        },
    })?;
    info!(
        "💻️ Payment webhook for order {} (invoice {}): {}",
        notification.order_id, notification.invoice_id, notification.status
    );
    let order = api.process_payment_update(payment_update(notification)).await.map_err(|e| {
        warn!("💻️ Could not apply payment webhook. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {} is {}", order.id, order.status))))
}

// ----------------------------------------------   Admin  -----------------------------------------------------
route!(search_orders => Get "/admin/orders" impl OrderStore where requires [Role::Admin]);
/// Order search for admins. Takes `listing_id`, `user_id`, `guest_email`, `status` (comma separated), `since` and
/// `until` query parameters. Results are in creation order.
pub async fn search_orders<B: OrderStore>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders search for [{filter}]");
    let orders: Vec<Order> = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(deliver_order => Post "/admin/orders/{order_id}/deliver" impl OrderStore where requires [Role::Admin]);
/// Attaches the delivery details to a paid order and marks it delivered. The buyer is notified.
pub async fn deliver_order<B: OrderStore>(
    path: web::Path<OrderId>,
    body: web::Json<DeliverOrderParams>,
    api: web::Data<FulfilmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let DeliverOrderParams { details, notes } = body.into_inner();
    info!("💻️ Delivery request for order {order_id}");
    let order = api.deliver(&order_id, &details, notes).await.map_err(|e| {
        debug!("💻️ Could not deliver order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(complete_order => Post "/admin/orders/{order_id}/complete" impl OrderStore where requires [Role::Admin]);
pub async fn complete_order<B: OrderStore>(
    path: web::Path<OrderId>,
    body: Option<web::Json<CompleteOrderParams>>,
    api: web::Data<FulfilmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    info!("💻️ Completion request for order {order_id}");
    let order = api.complete(&order_id, params.details.as_deref()).await.map_err(|e| {
        debug!("💻️ Could not complete order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/admin/orders/{order_id}/cancel" impl OrderStore where requires [Role::Admin]);
/// Order cancellation
///
/// Pending and paid orders can be cancelled. The reason is stored on the order and the listing becomes available to
/// other buyers again. Refunds for paid orders are handled outside this system.
pub async fn cancel_order<B: OrderStore>(
    path: web::Path<OrderId>,
    body: web::Json<CancelOrderParams>,
    api: web::Data<FulfilmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let CancelOrderParams { reason } = body.into_inner();
    info!("💻️ Cancel order request for {order_id}. Reason: {reason}");
    let order = api.cancel(&order_id, &reason).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(expire_orders => Post "/admin/orders/expire" impl OrderStore where requires [Role::Admin]);
/// Runs the expiry sweep now, rather than waiting for the background worker.
pub async fn expire_orders<B: OrderStore>(
    options: web::Data<ServerOptions>,
    api: web::Data<FulfilmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ On-demand expiry sweep requested");
    let expired = api.expire_stale_orders(options.order_fallback_timeout).await?;
    Ok(HttpResponse::Ok().json(ExpiryResult { expired: expired.len() }))
}

// ----------------------------------------------   Exchange rates  --------------------------------------------
route!(exchange_rate => Get "/exchange_rate/{currency}" impl ExchangeRates, RateSource);
/// The rate used to convert prices in `currency` to the settlement currency.
pub async fn exchange_rate<B, R>(
    currency: web::Path<String>,
    options: web::Data<ServerOptions>,
    api: web::Data<ExchangeRateApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: ExchangeRates,
    R: RateSource,
{
    let currency = currency.into_inner();
    debug!("💻️ GET exchange rate for {currency}");
    let rate = api.current_rate(&currency, &options.settlement_currency).await.map_err(|e| {
        debug!("💻️ Could not fetch exchange rate. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(ExchangeRateResult::from(rate)))
}
