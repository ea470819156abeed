use sqlx::SqliteConnection;

use crate::db_types::Listing;

pub async fn fetch_listing(listing_id: &str, conn: &mut SqliteConnection) -> Result<Option<Listing>, sqlx::Error> {
    let listing = sqlx::query_as("SELECT id, title, price, currency, is_available FROM listings WHERE id = $1")
        .bind(listing_id)
        .fetch_optional(conn)
        .await?;
    Ok(listing)
}

/// Mirrors a listing from the catalog into the local table.
pub async fn upsert_listing(listing: &Listing, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO listings (id, title, price, currency, is_available) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET
            title = excluded.title,
            price = excluded.price,
            currency = excluded.currency,
            is_available = excluded.is_available,
            updated_at = CURRENT_TIMESTAMP;
    "#,
    )
    .bind(listing.id.as_str())
    .bind(listing.title.as_str())
    .bind(listing.price.value())
    .bind(listing.currency.as_str())
    .bind(listing.is_available)
    .execute(conn)
    .await?;
    Ok(())
}
