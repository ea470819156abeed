//! # Invoice gateway adapter
//!
//! A thin, signed client for the crypto payment gateway's invoice API. It knows how to
//! * create an invoice for a settlement amount and fetch an invoice's current status,
//! * sign outgoing payloads and verify the signature on inbound webhook bodies,
//! * validate every gateway response into a typed [`GatewayMessage`] before anything else sees it.
//!
//! Nothing in this crate knows about marketplace orders. Callers supply an opaque order id and get back the gateway's
//! view of the invoice.
mod api;
mod config;
mod data_objects;
mod error;
mod rates;
mod signature;

pub use api::GatewayClient;
pub use config::GatewayConfig;
pub use data_objects::{
    GatewayMessage,
    Invoice,
    InvoiceRequest,
    MessageKind,
    PaymentStatus,
    Settlement,
    WebhookNotification,
};
pub use error::GatewayError;
pub use rates::{HttpRateSource, RateSourceConfig};
pub use signature::{canonical_json, PayloadSigner};
