use std::time::Duration as StdDuration;

use chrono::Duration;
use log::*;
use order_engine::{db_types::Order, FulfilmentApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick expires pending orders whose invoice has run out, and pending orders without an invoice expiry that are
/// older than `fallback`.
pub fn start_expiry_worker(
    api: FulfilmentApi<SqliteDatabase>,
    fallback: Duration,
    interval: StdDuration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Order expiry worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running order expiry job");
            match api.expire_stale_orders(fallback).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] listing_id: {} expires_at: {:?}", o.id, o.listing_id, o.expires_at))
        .collect::<Vec<String>>()
        .join(", ")
}
