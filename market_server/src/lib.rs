//! # Channel Market server
//! This crate hosts the HTTP server for the channel marketplace's order and payment engine. It is responsible for:
//! Taking purchase intents and opening crypto invoices for them with the payment gateway.
//! Receiving the gateway's signed payment webhooks and applying them to orders.
//! Letting buyers and admins read and poll orders, and admins deliver, complete and cancel them.
//! Expiring stale pending orders in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: Payment notifications from the gateway.
//! * `/api/...`: Order, admin and exchange rate endpoints. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
