use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::{ExchangeRateError, InvoiceProviderError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Listing {0} does not exist")]
    ListingNotFound(String),
    #[error("Listing {0} is not available for purchase")]
    ListingUnavailable(String),
    #[error("Listing {0} has already been sold")]
    ListingSold(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No order matches payment reference {0}")]
    UnknownPaymentReference(String),
    #[error("Order {id} is {status} and cannot be {action}")]
    InvalidTransition { id: OrderId, status: OrderStatusType, action: &'static str },
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Exchange rate error: {0}")]
    ExchangeRateError(#[from] ExchangeRateError),
}

impl From<StoreError> for OrderFlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseError(s) => OrderFlowError::DatabaseError(s),
            StoreError::OrderNotFound(id) => OrderFlowError::OrderNotFound(id),
            StoreError::ListingSold(id) => OrderFlowError::ListingSold(id),
            StoreError::IllegalTransition { from, to } => {
                OrderFlowError::InvalidRequest(format!("An order may not move from {from} to {to}"))
            },
            StoreError::InvalidOrder(s) => OrderFlowError::InvalidRequest(s),
        }
    }
}

impl From<InvoiceProviderError> for OrderFlowError {
    fn from(e: InvoiceProviderError) -> Self {
        OrderFlowError::GatewayError(e.to_string())
    }
}
