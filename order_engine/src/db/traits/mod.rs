//! # Backend and collaborator contracts
//!
//! The engine never talks to a database or a payment provider directly. Everything goes through the traits defined
//! here, so that the SQLite backend, the HTTP gateway client and the test mocks are interchangeable.
//!
//! * [`OrderStore`] is the durable order record. Every status change goes through [`OrderStore::try_transition`], a
//!   single compare-and-set update.
//! * [`ListingCatalog`] is a read-only view of the listings that can be bought.
//! * [`ExchangeRates`] caches the last good exchange rate for each currency pair.
//! * [`MarketDatabase`] bundles the three for backends that provide all of them.
//! * [`InvoiceProvider`] opens and queries invoices with a payment provider.
//! * [`RateSource`] fetches live exchange rates.
mod data_objects;
mod exchange_rates;
mod order_store;
mod providers;

pub use data_objects::TransitionEffects;
pub use exchange_rates::{ExchangeRateError, ExchangeRates};
pub use order_store::{ListingCatalog, MarketDatabase, OrderStore, StoreError};
pub use providers::{InvoiceProvider, InvoiceProviderError, NewInvoice, RateSource};
