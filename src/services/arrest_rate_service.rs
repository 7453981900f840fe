// src/services/arrest_rate_service.rs
// DOCUMENTATION: Cached district arrest-rate lookup
// PURPOSE: rate_for(district) -> rate in [0, 1] or a not-found marker

use crate::db::ArrestRateSource;
use crate::errors::AnalysisError;
use crate::services::cache::{arrest_rate_key, read_json, write_json, CacheRead, KeyValueCache};
use std::sync::Arc;
use std::time::Duration;

/// Arrest-rate lookup result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrestRateLookup {
    /// 0.0 when no data exists for the district
    pub rate: f64,
    pub data_found: bool,
    pub cache_hit: bool,
}

impl ArrestRateLookup {
    fn from_cached(rate: Option<f64>, cache_hit: bool) -> Self {
        Self {
            rate: rate.unwrap_or(0.0),
            data_found: rate.is_some(),
            cache_hit,
        }
    }
}

/// Arrest-rate service
/// DOCUMENTATION: Missing districts are cached as JSON `null` so unknown
/// districts do not hit the store on every request
pub struct ArrestRateService {
    source: Arc<dyn ArrestRateSource>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
    write_timeout: Duration,
}

impl ArrestRateService {
    pub fn new(
        source: Arc<dyn ArrestRateSource>,
        cache: Arc<dyn KeyValueCache>,
        ttl: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            write_timeout,
        }
    }

    pub async fn rate_for(&self, district: &str) -> Result<ArrestRateLookup, AnalysisError> {
        let key = arrest_rate_key(district);

        let cache_usable = match read_json::<Option<f64>>(self.cache.as_ref(), &key).await {
            CacheRead::Hit(rate) => return Ok(ArrestRateLookup::from_cached(rate, true)),
            CacheRead::Miss => true,
            CacheRead::Unavailable(_) => false,
        };

        let rate = self.source.rate_for(district.trim()).await?.map(|rate| {
            if !(0.0..=1.0).contains(&rate) {
                log::warn!("Arrest rate {} for {} outside [0, 1], clamping", rate, district);
            }
            if rate.is_nan() {
                0.0
            } else {
                rate.clamp(0.0, 1.0)
            }
        });

        if rate.is_none() {
            log::info!("No arrest-rate data for district {}", district);
        }

        if cache_usable {
            write_json(self.cache.as_ref(), &key, &rate, self.ttl, self.write_timeout).await;
        }

        Ok(ArrestRateLookup::from_cached(rate, false))
    }
}
