//! The public API of the order engine.
//!
//! * [`purchase_api::PurchaseApi`] creates orders and opens invoices for them.
//! * [`order_flow_api::OrderFlowApi`] reconciles orders with payment notifications and client polls.
//! * [`fulfilment_api::FulfilmentApi`] delivers, completes, cancels and expires orders.
//! * [`order_query_api::OrderQueryApi`] reads orders, applying buyer access rules.
//! * [`exchange_rate_api::ExchangeRateApi`] converts listing prices into the settlement currency.
pub mod errors;
pub mod exchange_rate_api;
pub mod fulfilment_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
pub mod purchase_api;
