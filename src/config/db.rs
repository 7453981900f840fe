// src/config/db.rs
// DOCUMENTATION: Database connection pool initialization
// PURPOSE: Setup the PostgreSQL pool holding the ETL-populated reference tables

use crate::config::Config;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Tables this service reads; populated by the external ETL loaders
const REFERENCE_TABLES: [&str; 4] = ["cctv_geo", "police_office_geo", "amenity_geo", "arrest_rate"];

/// Initialize PostgreSQL connection pool
/// DOCUMENTATION: Called once during application startup in main.rs.
/// Sessions are opened read-only since reference data is never written here.
pub async fn init_db_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    log::info!(
        "Initializing database pool (max {} connections)",
        config.db_max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connection_timeout))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    for table in REFERENCE_TABLES {
        let (exists,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(&pool)
            .await?;
        if !exists {
            log::warn!("Reference table {} is missing - has the ETL run?", table);
        }
    }

    log::info!("Database pool initialized successfully");
    Ok(pool)
}
