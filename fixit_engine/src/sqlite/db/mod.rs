//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or open an atomic transaction as
//! the need arises and pass `&mut *tx` through to the functions without any other changes.
//!
//! Functions here do not interpret "no rows" results. A conditional write that touched nothing returns `None` (or
//! `false`), and [`crate::SqliteDatabase`] decides whether that means "not found" or "not allowed".
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod applicants;
pub mod appointments;
pub mod chat_rooms;
pub mod devices;
pub mod ledger;
pub mod orders;
pub mod partners;
pub mod promotions;
pub mod ratings;

const SQLITE_DB_URL: &str = "sqlite://data/fixit.db";

pub fn db_url() -> String {
    let result = env::var("FIXIT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ FIXIT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
