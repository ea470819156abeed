use log::*;
use market_common::Cents;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{db_types::Listing, SqliteDatabase};

/// Loads `.env.test`, starts logging and creates a fresh, migrated database at `url`.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

/// A database URL that no other test will use.
pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("market_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Could not drop database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

/// A listing that can be bought.
pub fn listing(id: &str, price: i64, currency: &str) -> Listing {
    Listing {
        id: id.to_string(),
        title: format!("Channel {id}"),
        price: Cents::from(price),
        currency: currency.to_string(),
        is_available: true,
    }
}

/// Seeds the catalog with three available listings priced in USD and EUR, and one that has been withdrawn.
pub async fn seed_listings(db: &SqliteDatabase) {
    let mut withdrawn = listing("listing-withdrawn", 5_000, "USD");
    withdrawn.is_available = false;
    let listings = [
        listing("listing-1", 10_000, "USD"),
        listing("listing-2", 25_000, "USD"),
        listing("listing-3", 20_000, "EUR"),
        withdrawn,
    ];
    for l in &listings {
        db.upsert_listing(l).await.expect("Error seeding listing");
    }
    debug!("🚀️ Seeded {} listings", listings.len());
}
