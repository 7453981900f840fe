// src/services/testing.rs
// DOCUMENTATION: In-memory fakes for unit tests
// PURPOSE: Counting store, scripted geocoder and misbehaving caches used to
// check batching, short-circuit and degradation behavior

use crate::db::{ArrestRateSource, FacilityStore};
use crate::errors::AnalysisError;
use crate::models::*;
use crate::services::cache::KeyValueCache;
use crate::services::geocode_client::ReverseGeocoder;
use crate::services::geohash;
use crate::services::observer::{StageEvent, StageObserver};
use async_trait::async_trait;
use geo_types::Point;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Precision the fixtures are tagged with
pub const FIXTURE_PRECISION: usize = 6;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Point `meters` due east (negative: west) of (lat, lng)
pub fn offset_east(lat: f64, lng: f64, meters: f64) -> (f64, f64) {
    let d_lng = (meters / (EARTH_RADIUS_METERS * lat.to_radians().cos())).to_degrees();
    (lat, lng + d_lng)
}

fn record(id: i64, lat: f64, lng: f64, attributes: FacilityAttributes) -> FacilityRecord {
    FacilityRecord {
        id,
        geohash_id: geohash::encode(lat, lng, FIXTURE_PRECISION).unwrap(),
        latitude: lat,
        longitude: lng,
        name: None,
        address: None,
        attributes,
    }
}

pub fn cctv_at(id: i64, lat: f64, lng: f64, east_meters: f64, camera_count: u32) -> FacilityRecord {
    let (lat, lng) = offset_east(lat, lng, east_meters);
    record(id, lat, lng, FacilityAttributes::Cctv { camera_count })
}

pub fn police_at(id: i64, name: &str, lat: f64, lng: f64, east_meters: f64) -> FacilityRecord {
    let (lat, lng) = offset_east(lat, lng, east_meters);
    let mut r = record(id, lat, lng, FacilityAttributes::PoliceOffice);
    r.name = Some(name.to_string());
    r
}

pub fn amenity_at(
    id: i64,
    category: AmenityCategory,
    lat: f64,
    lng: f64,
    east_meters: f64,
) -> FacilityRecord {
    let (lat, lng) = offset_east(lat, lng, east_meters);
    let mut r = record(id, lat, lng, FacilityAttributes::Amenity { category });
    r.name = Some(format!("{} {}", category.display_name(), id));
    r
}

/// Facility store over a fixed record list that counts queries
#[derive(Default)]
pub struct CountingStore {
    records: Vec<FacilityRecord>,
    fail: bool,
    calls: AtomicUsize,
    nearest_calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
}

impl CountingStore {
    pub fn new(records: Vec<FacilityRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Number of `find_by_cells` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `find_nearest` calls so far
    pub fn nearest_calls(&self) -> usize {
        self.nearest_calls.load(Ordering::SeqCst)
    }

    pub fn last_batch(&self) -> Vec<String> {
        self.batches.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl FacilityStore for CountingStore {
    async fn find_by_cells(
        &self,
        dataset: Dataset,
        cells: &[String],
    ) -> Result<Vec<FacilityRecord>, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(cells.to_vec());
        if self.fail {
            return Err(AnalysisError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.dataset() == dataset && cells.contains(&r.geohash_id))
            .cloned()
            .collect())
    }

    async fn find_all(&self, dataset: Dataset) -> Result<Vec<FacilityRecord>, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.dataset() == dataset)
            .cloned()
            .collect())
    }

    async fn find_nearest(
        &self,
        dataset: Dataset,
        origin: Point<f64>,
    ) -> Result<Option<FacilityRecord>, AnalysisError> {
        self.nearest_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AnalysisError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.dataset() == dataset)
            .min_by(|a, b| {
                geohash::haversine_distance(origin, a.point())
                    .total_cmp(&geohash::haversine_distance(origin, b.point()))
            })
            .cloned())
    }
}

/// Geocoder returning a scripted answer
pub struct ScriptedGeocoder {
    answer: Result<GeocodedAddress, AnalysisError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    pub fn road(address: &str) -> Self {
        Self {
            answer: Ok(GeocodedAddress {
                road_address: Some(address.to_string()),
                jibun_address: None,
            }),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(AnalysisError::GeocodeUnavailable("503 from upstream".to_string())),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers only after `delay`
    pub fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::road("서울특별시 중구 세종대로 110")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for ScriptedGeocoder {
    async fn reverse_geocode(&self, _lat: f64, _lng: f64) -> Result<GeocodedAddress, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer.clone()
    }
}

/// District -> rate table
#[derive(Default)]
pub struct FixedArrestRates {
    rates: HashMap<String, f64>,
    calls: AtomicUsize,
}

impl FixedArrestRates {
    pub fn new(rates: &[(&str, f64)]) -> Self {
        Self {
            rates: rates.iter().map(|(d, r)| (d.to_string(), *r)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArrestRateSource for FixedArrestRates {
    async fn rate_for(&self, district: &str) -> Result<Option<f64>, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rates.get(district).copied())
    }
}

/// Cache that is always unreachable
pub struct FailingCache;

#[async_trait]
impl KeyValueCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, AnalysisError> {
        Err(AnalysisError::CacheUnavailable("connection reset".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), AnalysisError> {
        Err(AnalysisError::CacheUnavailable("connection reset".to_string()))
    }
}

/// Cache whose reads always miss and whose writes never complete
#[derive(Default)]
pub struct StallingWriteCache;

#[async_trait]
impl KeyValueCache for StallingWriteCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, AnalysisError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), AnalysisError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Observer keeping every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StageEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StageObserver for RecordingObserver {
    fn on_stage(&self, event: &StageEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
