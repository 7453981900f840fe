// src/services/address_resolver.rs
// DOCUMENTATION: Cached reverse geocoding plus district derivation
// PURPOSE: resolve(lat, lng) -> road/jibun address and administrative district

use crate::config::GeocodeSettings;
use crate::errors::AnalysisError;
use crate::models::{GeocodedAddress, ResolvedAddress};
use crate::services::cache::{address_key, read_json, write_json, CacheRead, KeyValueCache};
use crate::services::district::DistrictExtractor;
use crate::services::geocode_client::ReverseGeocoder;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a resolve call
#[derive(Debug, Clone)]
pub struct Resolution {
    pub address: ResolvedAddress,
    pub cache_hit: bool,
    pub cache_degraded: bool,
}

/// Address resolver
/// DOCUMENTATION: The coordinate is rounded to `coordinate_decimals` before
/// the cache key is built and before the geocoder is called, so every
/// coordinate sharing a key shares one cached answer. Only the raw address
/// pair is cached; the district is derived on every call.
pub struct AddressResolver {
    geocoder: Arc<dyn ReverseGeocoder>,
    cache: Arc<dyn KeyValueCache>,
    extractor: Box<dyn DistrictExtractor>,
    coordinate_decimals: u32,
    call_timeout: Duration,
    ttl: Duration,
    write_timeout: Duration,
}

impl AddressResolver {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        cache: Arc<dyn KeyValueCache>,
        extractor: Box<dyn DistrictExtractor>,
        settings: &GeocodeSettings,
        ttl: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            cache,
            extractor,
            coordinate_decimals: settings.coordinate_decimals,
            call_timeout: settings.connect_timeout + settings.response_timeout,
            ttl,
            write_timeout,
        }
    }

    pub async fn resolve(&self, lat: f64, lng: f64) -> Result<Resolution, AnalysisError> {
        let factor = 10f64.powi(self.coordinate_decimals as i32);
        let (lat, lng) = ((lat * factor).round() / factor, (lng * factor).round() / factor);
        let key = address_key(lat, lng, self.coordinate_decimals);

        let mut cache_degraded = false;
        match read_json::<GeocodedAddress>(self.cache.as_ref(), &key).await {
            CacheRead::Hit(geocoded) => {
                return Ok(Resolution {
                    address: self.derive(geocoded),
                    cache_hit: true,
                    cache_degraded,
                });
            }
            CacheRead::Miss => {}
            CacheRead::Unavailable(_) => cache_degraded = true,
        }

        let geocoded =
            match tokio::time::timeout(self.call_timeout, self.geocoder.reverse_geocode(lat, lng))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AnalysisError::GeocodeUnavailable(format!(
                        "no answer within {:?}",
                        self.call_timeout
                    )))
                }
            };

        if !cache_degraded {
            write_json(
                self.cache.as_ref(),
                &key,
                &geocoded,
                self.ttl,
                self.write_timeout,
            )
            .await;
        }

        Ok(Resolution {
            address: self.derive(geocoded),
            cache_hit: false,
            cache_degraded,
        })
    }

    fn derive(&self, geocoded: GeocodedAddress) -> ResolvedAddress {
        let district = geocoded
            .primary()
            .and_then(|line| self.extractor.extract(line));
        if district.is_none() {
            log::debug!(
                "No district derived ({}) from {:?}",
                self.extractor.name(),
                geocoded.primary()
            );
        }

        ResolvedAddress {
            road_address: geocoded.road_address,
            jibun_address: geocoded.jibun_address,
            district,
        }
    }
}
