// src/db.rs
//! Postgres pool construction and schema migration.
//!
//! The pool is built once in `main` and handed down explicitly; it must
//! outlive the scheduler (scheduler stops before the pool closes).

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

const CONNECT_RETRIES: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Connect with retry: the database container often comes up after us.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match PgPoolOptions::new()
            .min_connections(2)
            .max_connections(10)
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                info!("database pool ready");
                return Ok(pool);
            }
            Err(e) if attempt < CONNECT_RETRIES => {
                warn!(
                    attempt,
                    retries = CONNECT_RETRIES,
                    error = %e,
                    "db connection failed, retrying"
                );
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => return Err(e).context("connecting to postgres"),
        }
    }
}

/// Apply embedded migrations from `migrations/`.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("running database migrations")
}
