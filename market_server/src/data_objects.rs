use std::fmt::Display;

use chrono::{DateTime, Utc};
use order_engine::{
    db_types::{ExchangeRate, OrderStatusType},
    order_objects::OrderQueryFilter,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The `?email=` parameter guests use to prove they placed an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailParam {
    pub email: Option<String>,
}

impl EmailParam {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverOrderParams {
    pub details: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOrderParams {
    /// Delivery details, for orders that are completed straight from `paid`.
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderParams {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpiryResult {
    pub expired: usize,
}

/// Query parameters for the admin order search. `status` is a comma separated list, e.g. `?status=paid,delivered`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderSearchParams {
    pub listing_id: Option<String>,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter::default();
        if let Some(id) = params.listing_id {
            filter = filter.with_listing_id(id);
        }
        if let Some(id) = params.user_id {
            filter = filter.with_user_id(id);
        }
        if let Some(email) = params.guest_email {
            filter = filter.with_guest_email(email);
        }
        for status in params.status.iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()) {
            let status = status
                .parse::<OrderStatusType>()
                .map_err(|e| ServerError::InvalidRequestPath(format!("Invalid status filter. {e}")))?;
            filter = filter.with_status(status);
        }
        if let Some(since) = params.since {
            filter = filter.since(since);
        }
        if let Some(until) = params.until {
            filter = filter.until(until);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateResult {
    pub base_currency: String,
    pub quote_currency: String,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<ExchangeRate> for ExchangeRateResult {
    fn from(value: ExchangeRate) -> Self {
        Self {
            base_currency: value.base_currency,
            quote_currency: value.quote_currency,
            rate: value.rate,
            updated_at: value.updated_at,
        }
    }
}
