// src/db/facility_repository.rs
// DOCUMENTATION: Read access to the geohash-tagged facility tables
// PURPOSE: Batched per-cell lookups behind the tier-2 grid cache

use crate::errors::AnalysisError;
use crate::models::*;
use async_trait::async_trait;
use geo_types::Point;
use sqlx::{FromRow, PgPool};

/// Source of truth for facility records
/// DOCUMENTATION: `find_by_cells` must answer every requested cell in a single
/// round trip; the grid cache relies on it to avoid one query per cell.
#[async_trait]
pub trait FacilityStore: Send + Sync {
    /// All records of `dataset` whose geohash id is one of `cells`
    async fn find_by_cells(
        &self,
        dataset: Dataset,
        cells: &[String],
    ) -> Result<Vec<FacilityRecord>, AnalysisError>;

    /// Every record of `dataset` (used by the police office map endpoint)
    async fn find_all(&self, dataset: Dataset) -> Result<Vec<FacilityRecord>, AnalysisError>;

    /// The record of `dataset` closest to `origin`, regardless of cell
    async fn find_nearest(
        &self,
        dataset: Dataset,
        origin: Point<f64>,
    ) -> Result<Option<FacilityRecord>, AnalysisError>;
}

/// Internal struct for mapping rows of the three facility tables
/// DOCUMENTATION: Columns a table does not have are selected as NULL so one
/// row type covers all datasets
#[derive(Debug, FromRow)]
struct FacilityRow {
    pub id: i64,
    pub geohash_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
    pub camera_count: Option<i32>,
    pub category_code: Option<String>,
}

impl FacilityRow {
    /// Convert FacilityRow to FacilityRecord; amenity rows with an unknown
    /// category code are dropped
    fn into_record(self, dataset: Dataset) -> Option<FacilityRecord> {
        let attributes = match dataset {
            Dataset::Cctv => FacilityAttributes::Cctv {
                camera_count: self.camera_count.unwrap_or(1).max(0) as u32,
            },
            Dataset::PoliceOffice => FacilityAttributes::PoliceOffice,
            Dataset::Amenity => {
                let code = self.category_code.as_deref().unwrap_or_default();
                match AmenityCategory::from_code(code) {
                    Some(category) => FacilityAttributes::Amenity { category },
                    None => {
                        log::warn!(
                            "Skipping amenity {} with unknown category code '{}'",
                            self.id,
                            code
                        );
                        return None;
                    }
                }
            }
        };

        Some(FacilityRecord {
            id: self.id,
            geohash_id: self.geohash_id,
            latitude: self.latitude,
            longitude: self.longitude,
            name: self.name,
            address: self.address,
            attributes,
        })
    }
}

/// Column list per dataset, shaped to `FacilityRow`
fn select_clause(dataset: Dataset) -> &'static str {
    match dataset {
        Dataset::Cctv => {
            "SELECT id::BIGINT AS id, geohash_id, latitude, longitude, \
             NULL::TEXT AS name, address, camera_count::INT4 AS camera_count, \
             NULL::TEXT AS category_code FROM cctv_geo"
        }
        Dataset::PoliceOffice => {
            "SELECT id::BIGINT AS id, geohash_id, latitude, longitude, \
             name, address, NULL::INT4 AS camera_count, \
             NULL::TEXT AS category_code FROM police_office_geo"
        }
        Dataset::Amenity => {
            "SELECT id::BIGINT AS id, geohash_id, latitude, longitude, \
             name, address, NULL::INT4 AS camera_count, \
             category_code FROM amenity_geo"
        }
    }
}

/// PostgreSQL-backed facility store
/// DOCUMENTATION: Uses query_as with `geohash_id = ANY($1)` so a whole batch
/// of missed cells is one statement
#[derive(Clone)]
pub struct PgFacilityStore {
    pool: PgPool,
}

impl PgFacilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn into_records(rows: Vec<FacilityRow>, dataset: Dataset) -> Vec<FacilityRecord> {
        rows.into_iter()
            .filter_map(|row| row.into_record(dataset))
            .collect()
    }
}

#[async_trait]
impl FacilityStore for PgFacilityStore {
    async fn find_by_cells(
        &self,
        dataset: Dataset,
        cells: &[String],
    ) -> Result<Vec<FacilityRecord>, AnalysisError> {
        if cells.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} WHERE geohash_id = ANY($1)", select_clause(dataset));
        let rows: Vec<FacilityRow> = sqlx::query_as(&sql)
            .bind(cells)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                log::error!("Failed to load {} for {} cells: {}", dataset, cells.len(), e);
                AnalysisError::from(e)
            })?;

        log::debug!(
            "Loaded {} {} rows for cells {:?}",
            rows.len(),
            dataset,
            cells
        );
        Ok(Self::into_records(rows, dataset))
    }

    async fn find_all(&self, dataset: Dataset) -> Result<Vec<FacilityRecord>, AnalysisError> {
        let sql = format!("{} ORDER BY id", select_clause(dataset));
        let rows: Vec<FacilityRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                log::error!("Failed to load all {} rows: {}", dataset, e);
                AnalysisError::from(e)
            })?;

        Ok(Self::into_records(rows, dataset))
    }

    async fn find_nearest(
        &self,
        dataset: Dataset,
        origin: Point<f64>,
    ) -> Result<Option<FacilityRecord>, AnalysisError> {
        // Equirectangular ordering; the exact distance is computed by the caller
        let sql = format!(
            "{} ORDER BY POWER(latitude - $1::FLOAT8, 2) \
             + POWER((longitude - $2::FLOAT8) * COS(RADIANS($1::FLOAT8)), 2) LIMIT 1",
            select_clause(dataset)
        );
        let row: Option<FacilityRow> = sqlx::query_as(&sql)
            .bind(origin.y())
            .bind(origin.x())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                log::error!("Failed to find nearest {}: {}", dataset, e);
                AnalysisError::from(e)
            })?;

        Ok(row.and_then(|row| row.into_record(dataset)))
    }
}
