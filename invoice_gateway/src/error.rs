use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid invoice request: {0}")]
    InvalidRequest(String),
    #[error("Request to the gateway failed: {0}")]
    RequestFailed(String),
    #[error("Gateway returned error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize gateway JSON: {0}")]
    JsonError(String),
    #[error("Gateway response was rejected: {0}")]
    UnexpectedResponse(String),
    #[error("Unknown payment status: {0}")]
    UnknownPaymentStatus(String),
    #[error("Webhook body carries no signature")]
    MissingSignature,
    #[error("Webhook signature is invalid")]
    InvalidSignature,
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),
}
