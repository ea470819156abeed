use sqlx::SqliteConnection;

use crate::{db_types::ExchangeRate, traits::ExchangeRateError};

pub async fn fetch_last_rate(
    base: &str,
    quote: &str,
    conn: &mut SqliteConnection,
) -> Result<ExchangeRate, ExchangeRateError> {
    let base = base.to_uppercase();
    let quote = quote.to_uppercase();
    let rate = sqlx::query_as(
        r#"
        SELECT base_currency, quote_currency, rate, updated_at FROM exchange_rates
        WHERE base_currency = $1 AND quote_currency = $2
        ORDER BY unixepoch(updated_at) DESC, id DESC LIMIT 1
    "#,
    )
    .bind(base.as_str())
    .bind(quote.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ExchangeRateError::RateDoesNotExist(format!("{base}/{quote}")))?;
    Ok(rate)
}

pub async fn set_exchange_rate(rate: &ExchangeRate, conn: &mut SqliteConnection) -> Result<(), ExchangeRateError> {
    sqlx::query("INSERT INTO exchange_rates (base_currency, quote_currency, rate, updated_at) VALUES ($1, $2, $3, $4)")
        .bind(rate.base_currency.to_uppercase())
        .bind(rate.quote_currency.to_uppercase())
        .bind(rate.rate)
        .bind(rate.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}
