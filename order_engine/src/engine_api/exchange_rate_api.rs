//! Amount conversion between a listing's own currency and the settlement currency.
//!
//! Rates come from the live [`RateSource`] when it answers, from the last cached rate when it does not, and from a
//! configured constant as a last resort. Every live rate is cached.
use std::{collections::HashMap, fmt::Debug};

use log::*;
use market_common::Cents;

use crate::{
    db_types::ExchangeRate,
    traits::{ExchangeRateError, ExchangeRates, RateSource},
};

pub struct ExchangeRateApi<B, R> {
    db: B,
    source: R,
    /// Last-resort rates into the settlement currency, keyed by upper-case base currency.
    fallbacks: HashMap<String, f64>,
}

impl<B, R> Debug for ExchangeRateApi<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangeRateApi")
    }
}

impl<B, R> ExchangeRateApi<B, R>
where
    B: ExchangeRates,
    R: RateSource,
{
    pub fn new(db: B, source: R, fallbacks: HashMap<String, f64>) -> Self {
        let fallbacks = fallbacks.into_iter().map(|(k, v)| (k.to_uppercase(), v)).collect();
        Self { db, source, fallbacks }
    }

    /// The best available rate for `base` → `quote`.
    pub async fn current_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();
        if base == quote {
            return Ok(ExchangeRate::new(&base, &quote, 1.0));
        }
        match self.source.fetch_rate(&base, &quote).await {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                let rate = ExchangeRate::new(&base, &quote, rate);
                if let Err(e) = self.db.set_exchange_rate(&rate).await {
                    warn!("💱️ Could not cache {base}/{quote} rate. {e}");
                }
                return Ok(rate);
            },
            Ok(rate) => warn!("💱️ Rate source quoted {rate} for {base}/{quote}. Ignoring it."),
            Err(e) => warn!("💱️ Rate source failed for {base}/{quote}. {e}"),
        }
        match self.db.fetch_last_rate(&base, &quote).await {
            Ok(rate) => {
                info!("💱️ Using cached {base}/{quote} rate of {} from {}", rate.rate, rate.updated_at);
                return Ok(rate);
            },
            Err(ExchangeRateError::RateDoesNotExist(_)) => {},
            Err(e) => warn!("💱️ Could not read cached {base}/{quote} rate. {e}"),
        }
        match self.fallbacks.get(&base) {
            Some(rate) => {
                warn!("💱️ Falling back to the configured {base}/{quote} rate of {rate}");
                Ok(ExchangeRate::new(&base, &quote, *rate))
            },
            None => Err(ExchangeRateError::RateDoesNotExist(format!("{base}/{quote}"))),
        }
    }

    /// Converts `amount` from `base` to `quote`, returning the converted amount and the rate that was used.
    pub async fn convert(&self, amount: Cents, base: &str, quote: &str) -> Result<(Cents, f64), ExchangeRateError> {
        let rate = self.current_rate(base, quote).await?;
        let converted = amount.convert(rate.rate).map_err(|e| ExchangeRateError::ConversionError(e.to_string()))?;
        debug!("💱️ {amount} {base} is {converted} {quote} at {}", rate.rate);
        Ok((converted, rate.rate))
    }

    pub async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        self.db.set_exchange_rate(rate).await
    }
}
