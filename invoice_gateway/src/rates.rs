use std::time::Duration;

use log::*;
use reqwest::Client;
use serde_json::Value;

use crate::GatewayError;

const DEFAULT_RATE_URL: &str = "https://open.er-api.com/v6/latest/{base}";

#[derive(Debug, Clone)]
pub struct RateSourceConfig {
    /// URL of the rate provider. `{base}` is replaced with the base currency code.
    pub url_template: String,
    pub timeout: Duration,
}

impl Default for RateSourceConfig {
    fn default() -> Self {
        Self { url_template: DEFAULT_RATE_URL.to_string(), timeout: Duration::from_secs(5) }
    }
}

/// Fetches live exchange rates from an HTTP provider that answers with `{"rates": {"USD": 1.08, ...}}`.
#[derive(Clone)]
pub struct HttpRateSource {
    config: RateSourceConfig,
    client: Client,
}

impl HttpRateSource {
    pub fn new(config: RateSourceConfig) -> Result<Self, GatewayError> {
        let client =
            Client::builder().timeout(config.timeout).build().map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Returns how many units of `quote` one unit of `base` buys.
    pub async fn fetch_rate(&self, base: &str, quote: &str) -> Result<f64, GatewayError> {
        let url = self.config.url_template.replace("{base}", &base.to_uppercase());
        trace!("💱️ Fetching exchange rates from {url}");
        let response = self.client.get(&url).send().await.map_err(|e| GatewayError::RateUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::RateUnavailable(format!("Rate provider returned {}", response.status())));
        }
        let body = response.json::<Value>().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
        let rate = body["rates"][quote.to_uppercase()]
            .as_f64()
            .ok_or_else(|| GatewayError::RateUnavailable(format!("No {base}/{quote} rate in provider response")))?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(GatewayError::RateUnavailable(format!("Provider quoted a nonsensical rate: {rate}")));
        }
        debug!("💱️ Live rate {base}/{quote} = {rate}");
        Ok(rate)
    }
}
