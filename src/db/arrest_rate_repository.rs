// src/db/arrest_rate_repository.rs
// DOCUMENTATION: District arrest-rate lookups
// PURPOSE: Read the per-district arrest rate populated by the ETL loaders

use crate::errors::AnalysisError;
use async_trait::async_trait;
use sqlx::PgPool;

/// Source of per-district arrest rates
#[async_trait]
pub trait ArrestRateSource: Send + Sync {
    /// `Ok(None)` when the district has no row
    async fn rate_for(&self, district: &str) -> Result<Option<f64>, AnalysisError>;
}

/// PostgreSQL-backed arrest-rate repository
pub struct PgArrestRateRepository {
    pool: PgPool,
}

impl PgArrestRateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArrestRateSource for PgArrestRateRepository {
    async fn rate_for(&self, district: &str) -> Result<Option<f64>, AnalysisError> {
        let row: Option<(f64,)> =
            sqlx::query_as("SELECT rate::FLOAT8 FROM arrest_rate WHERE addr = $1 LIMIT 1")
                .bind(district)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    log::error!("Failed to load arrest rate for {}: {}", district, e);
                    AnalysisError::from(e)
                })?;

        Ok(row.map(|(rate,)| rate))
    }
}
