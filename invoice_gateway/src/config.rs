use std::time::Duration;

use log::*;
use market_common::Secret;

const DEFAULT_GATEWAY_URL: &str = "https://api.cryptomus.com";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Credentials and endpoint for the invoice gateway. Passed explicitly into [`crate::GatewayClient::new`] so that
/// tests and environments can each use their own.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub merchant_id: String,
    /// The payment API key. It is both the request signing secret and the webhook verification secret.
    pub api_key: Secret<String>,
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            merchant_id: String::default(),
            api_key: Secret::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: &str, merchant_id: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            merchant_id: merchant_id.to_string(),
            api_key: Secret::new(api_key.to_string()),
            ..Default::default()
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("MKT_GATEWAY_URL").unwrap_or_else(|_| {
            info!("🪛️ MKT_GATEWAY_URL not set, using {DEFAULT_GATEWAY_URL}");
            DEFAULT_GATEWAY_URL.to_string()
        });
        let merchant_id = std::env::var("MKT_GATEWAY_MERCHANT_ID").unwrap_or_else(|_| {
            warn!("🪛️ MKT_GATEWAY_MERCHANT_ID not set. Invoice creation will fail until it is configured.");
            String::default()
        });
        let api_key = Secret::new(std::env::var("MKT_GATEWAY_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ MKT_GATEWAY_API_KEY not set. Every webhook will fail signature verification.");
            String::default()
        }));
        let request_timeout = std::env::var("MKT_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid value for MKT_GATEWAY_TIMEOUT_SECS. {e}")).ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        Self { base_url: base_url.trim_end_matches('/').to_string(), merchant_id, api_key, request_timeout }
    }
}
