//! Channel Market Order Engine
//!
//! The order engine sells one-of-a-kind listings for crypto payments. It owns the order state machine and keeps it in
//! step with what the payment provider reports, whichever way that news arrives.
//!
//! The library is divided into two main sections:
//! 1. Persistence ([`traits`] and, with the `sqlite` feature, [`SqliteDatabase`]). The engine only ever talks to the
//!    database through the traits, and every status change is a single guarded update, so concurrent webhooks, polls
//!    and sweeps cannot move an order backwards or sell a listing twice. The data types stored in the database are
//!    defined in [`mod@db_types`] and are public.
//! 2. The engine API. [`PurchaseApi`] creates orders, [`OrderFlowApi`] reconciles payments, [`FulfilmentApi`] handles
//!    the admin lifecycle and expiry, and [`OrderQueryApi`] reads orders with the buyer access rules applied.
//!
//! The engine also emits events (see [`mod@events`]) when notifications are due or an order changes status. The host
//! application hooks into these to send email or update its own records.
mod db;

pub mod db_types;
pub mod events;
mod engine_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits;
pub use engine_api::{
    errors::OrderFlowError,
    exchange_rate_api::{self, ExchangeRateApi},
    fulfilment_api::FulfilmentApi,
    order_flow_api::{OrderFlowApi, SALE_CONFLICT_REASON},
    order_objects,
    order_query_api::OrderQueryApi,
    purchase_api::PurchaseApi,
};
