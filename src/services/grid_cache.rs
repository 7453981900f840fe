// src/services/grid_cache.rs
// DOCUMENTATION: Tier-2 per-cell dataset cache in front of the facility store
// PURPOSE: Answer a 9-block grid with parallel cache probes and at most one
// batched store query for all missed cells

use crate::db::FacilityStore;
use crate::errors::AnalysisError;
use crate::models::{Dataset, FacilityRecord};
use crate::services::cache::{grid_key, read_json, write_json, CacheRead, KeyValueCache};
use crate::services::geohash::haversine_distance;
use futures::stream::{self, StreamExt};
use geo_types::Point;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Facilities of one dataset for a set of cells
#[derive(Debug, Default)]
pub struct GridFetch {
    /// Every requested cell is present, possibly with an empty list
    pub cells: HashMap<String, Vec<FacilityRecord>>,
    pub hits: usize,
    pub misses: usize,
    /// Whether the batched store query ran
    pub store_queried: bool,
    /// Set when the cache could not be reached during this fetch
    pub cache_degraded: bool,
}

impl GridFetch {
    /// Union of all cells; an approximation superset of any radius inside the grid
    pub fn into_records(self) -> Vec<FacilityRecord> {
        let mut records: Vec<FacilityRecord> = self.cells.into_values().flatten().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    pub fn record_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }
}

/// Tier-2 cache
pub struct GridCache {
    store: Arc<dyn FacilityStore>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
    write_timeout: Duration,
    max_parallel_probes: usize,
}

impl GridCache {
    pub fn new(
        store: Arc<dyn FacilityStore>,
        cache: Arc<dyn KeyValueCache>,
        ttl: Duration,
        write_timeout: Duration,
        max_parallel_probes: usize,
    ) -> Self {
        Self {
            store,
            cache,
            ttl,
            write_timeout,
            max_parallel_probes: max_parallel_probes.max(1),
        }
    }

    /// Facilities of `dataset` in each of `cells`
    /// DOCUMENTATION: Cache probes run concurrently up to the configured
    /// fan-out. Misses are collapsed into one `find_by_cells` call and every
    /// fetched cell is written back, empty ones included. A store failure is
    /// returned as is; a cache failure only disables cache writes.
    pub async fn get_by_cells(
        &self,
        dataset: Dataset,
        cells: &[String],
    ) -> Result<GridFetch, AnalysisError> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = cells.iter().filter(|c| seen.insert(c.as_str())).collect();

        let cache = self.cache.as_ref();
        let probes: Vec<(String, CacheRead<Vec<FacilityRecord>>)> = stream::iter(unique)
            .map(move |cell| async move {
                let read = read_json(cache, &grid_key(cell, dataset)).await;
                (cell.clone(), read)
            })
            .buffer_unordered(self.max_parallel_probes)
            .collect()
            .await;

        let mut fetch = GridFetch::default();
        let mut missed = Vec::new();
        for (cell, read) in probes {
            match read {
                CacheRead::Hit(records) => {
                    fetch.hits += 1;
                    fetch.cells.insert(cell, records);
                }
                CacheRead::Miss => missed.push(cell),
                CacheRead::Unavailable(_) => {
                    fetch.cache_degraded = true;
                    missed.push(cell);
                }
            }
        }
        fetch.misses = missed.len();

        if missed.is_empty() {
            log::debug!("Grid {} fully cached ({} cells)", dataset, fetch.hits);
            return Ok(fetch);
        }

        // Keep the batch in request order so the query text is stable
        missed.sort_by_key(|cell| cells.iter().position(|c| c == cell));

        let rows = self.store.find_by_cells(dataset, &missed).await?;
        fetch.store_queried = true;

        let mut fetched: HashMap<String, Vec<FacilityRecord>> =
            missed.iter().map(|cell| (cell.clone(), Vec::new())).collect();
        for record in rows {
            match fetched.get_mut(&record.geohash_id) {
                Some(list) => list.push(record),
                None => log::warn!(
                    "Store returned {} {} outside the requested cells ({})",
                    dataset,
                    record.id,
                    record.geohash_id
                ),
            }
        }

        if fetch.cache_degraded {
            log::warn!("Skipping tier-2 writes for {}: cache unavailable", dataset);
        } else {
            let ttl = self.ttl;
            let timeout = self.write_timeout;
            let writes = fetched.iter().map(move |(cell, records)| async move {
                write_json(cache, &grid_key(cell, dataset), records, ttl, timeout).await
            });
            let written = futures::future::join_all(writes)
                .await
                .into_iter()
                .filter(|ok| *ok)
                .count();
            log::debug!(
                "Populated {}/{} tier-2 entries for {}",
                written,
                fetched.len(),
                dataset
            );
        }

        fetch.cells.extend(fetched);
        Ok(fetch)
    }
}

/// Exact great-circle radius filter
/// DOCUMENTATION: Keeps records whose distance to `origin` is at most
/// `radius_meters`. Input order is preserved, so filtering twice is a no-op.
pub fn filter_within_radius(
    records: &[FacilityRecord],
    origin: Point<f64>,
    radius_meters: f64,
) -> Vec<FacilityRecord> {
    records
        .iter()
        .filter(|r| haversine_distance(origin, r.point()) <= radius_meters)
        .cloned()
        .collect()
}
