// src/services/pipeline.rs
// DOCUMENTATION: Location analysis pipeline
// PURPOSE: L1_CHECK -> GRID_BUILD -> (L2_FETCH || GEOCODE -> ARREST_RATE) ->
// RADIUS_FILTER -> DISTANCE_CALC -> SCORE -> RESPONSE_ASSEMBLE -> L1_WRITE

use crate::config::AnalysisSettings;
use crate::db::{ArrestRateSource, FacilityStore};
use crate::errors::AnalysisError;
use crate::models::*;
use crate::services::address_resolver::{AddressResolver, Resolution};
use crate::services::arrest_rate_service::{ArrestRateLookup, ArrestRateService};
use crate::services::cache::{read_json, response_key, write_json, CacheRead, KeyValueCache};
use crate::services::district::extractor_for;
use crate::services::geocode_client::ReverseGeocoder;
use crate::services::geohash::{self, haversine_distance};
use crate::services::grid_cache::{filter_within_radius, GridCache, GridFetch};
use crate::services::observer::{Stage, StageEvent, StageObserver, StageOutcome};
use crate::services::score_engine::{CategoryInputs, SafetyInputs, ScoreEngine};
use chrono::Utc;
use geo_types::Point;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const RECOMMEND_SAFETY_AT: f64 = 80.0;
const RECOMMEND_CONVENIENCE_AT: f64 = 80.0;
const RECOMMEND_AMENITY_WITHIN_METERS: f64 = 200.0;
const WARN_SAFETY_BELOW: f64 = 40.0;
const WARN_POLICE_BEYOND_METERS: f64 = 1000.0;
const WARN_CAMERAS_BELOW: u32 = 10;
const WARN_ARREST_RATE_BELOW: f64 = 0.5;

/// Emits stage events for one request
struct StageRecorder<'a> {
    request_id: Uuid,
    observer: &'a dyn StageObserver,
}

impl StageRecorder<'_> {
    fn record(&self, stage: Stage, outcome: StageOutcome, started: Instant, detail: Option<String>) {
        self.observer.on_stage(&StageEvent {
            request_id: self.request_id,
            stage,
            outcome,
            duration: started.elapsed(),
            detail,
        });
    }
}

/// Output of the geocode branch
#[derive(Debug, Default)]
struct DistrictContext {
    /// None when the geocoder was unavailable
    address: Option<ResolvedAddress>,
    arrest: Option<ArrestRateLookup>,
}

/// Raw facility sets of the three datasets, grid superset and radius subset
struct FacilitySets {
    grid_cctv: Vec<FacilityRecord>,
    grid_police: Vec<FacilityRecord>,
    cctv: Vec<FacilityRecord>,
    amenities: Vec<FacilityRecord>,
}

/// The analysis pipeline
/// DOCUMENTATION: One instance is shared by all requests. Every collaborator
/// sits behind a trait so the pipeline can run against in-memory fakes.
pub struct LocationAnalysisPipeline {
    settings: AnalysisSettings,
    response_cache: Arc<dyn KeyValueCache>,
    store: Arc<dyn FacilityStore>,
    grid: GridCache,
    resolver: AddressResolver,
    arrest_rates: ArrestRateService,
    scores: ScoreEngine,
    observer: Arc<dyn StageObserver>,
}

impl LocationAnalysisPipeline {
    pub fn new(
        settings: AnalysisSettings,
        cache: Arc<dyn KeyValueCache>,
        store: Arc<dyn FacilityStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
        arrest_source: Arc<dyn ArrestRateSource>,
        observer: Arc<dyn StageObserver>,
    ) -> Self {
        let cache_settings = &settings.cache;
        let grid = GridCache::new(
            store.clone(),
            cache.clone(),
            cache_settings.grid_ttl,
            cache_settings.write_timeout,
            settings.max_parallel_cell_probes,
        );
        let resolver = AddressResolver::new(
            geocoder,
            cache.clone(),
            extractor_for(settings.geocode.district_strategy),
            &settings.geocode,
            cache_settings.geocode_ttl,
            cache_settings.write_timeout,
        );
        let arrest_rates = ArrestRateService::new(
            arrest_source,
            cache.clone(),
            cache_settings.arrest_rate_ttl,
            cache_settings.write_timeout,
        );
        let scores = ScoreEngine::new(settings.weights.clone());

        Self {
            settings,
            response_cache: cache,
            store,
            grid,
            resolver,
            arrest_rates,
            scores,
            observer,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze one location
    /// DOCUMENTATION: Client errors are returned before any stage runs. A store
    /// failure fails the request; a geocoder failure yields a PARTIAL result;
    /// a cache failure only costs latency.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        request.check(self.settings.max_radius_meters)?;

        // The radius must stay inside the 9-block grid, which narrows toward the poles
        let reach = geohash::grid_reach_meters(
            request.latitude,
            request.longitude,
            self.settings.geohash_precision,
        )?;
        if request.radius as f64 > reach {
            return Err(AnalysisError::ValidationError(format!(
                "radius {}m exceeds the {:.0}m the search grid covers at ({}, {})",
                request.radius, reach, request.latitude, request.longitude
            )));
        }

        let request_id = Uuid::new_v4();
        let recorder = StageRecorder {
            request_id,
            observer: self.observer.as_ref(),
        };
        log::info!(
            "request_id={} analyzing ({}, {}) radius={}m",
            request_id,
            request.latitude,
            request.longitude,
            request.radius
        );

        // L1_CHECK
        let started = Instant::now();
        let l1_key = response_key(
            request.latitude,
            request.longitude,
            request.radius,
            self.settings.geocode.coordinate_decimals,
        );
        let l1_usable = match read_json::<AnalysisResult>(self.response_cache.as_ref(), &l1_key).await {
            CacheRead::Hit(mut cached) => {
                recorder.record(Stage::L1Check, StageOutcome::Hit, started, Some(l1_key.clone()));
                // The key is rounded; echo the caller's own coordinate
                cached.latitude = request.latitude;
                cached.longitude = request.longitude;
                cached.from_cache = true;
                return Ok(cached);
            }
            CacheRead::Miss => {
                recorder.record(Stage::L1Check, StageOutcome::Miss, started, None);
                true
            }
            CacheRead::Unavailable(e) => {
                recorder.record(Stage::L1Check, StageOutcome::Degraded, started, Some(e.to_string()));
                false
            }
        };

        // GRID_BUILD
        let started = Instant::now();
        let cells = geohash::grid9(
            request.latitude,
            request.longitude,
            self.settings.geohash_precision,
        )?;
        let center_geohash = cells[0].clone();
        recorder.record(Stage::GridBuild, StageOutcome::Success, started, Some(cells.join(",")));

        // L2_FETCH runs alongside GEOCODE -> ARREST_RATE; the two join once
        let (fetches, district) = futures::try_join!(
            self.fetch_grid(&cells, &recorder),
            self.resolve_district(&request, &recorder)
        )?;

        // RADIUS_FILTER
        let started = Instant::now();
        let sets = Self::filter(fetches, request.origin(), request.radius as f64);
        recorder.record(
            Stage::RadiusFilter,
            StageOutcome::Success,
            started,
            Some(format!(
                "cctv {}/{} amenity {}",
                sets.cctv.len(),
                sets.grid_cctv.len(),
                sets.amenities.len()
            )),
        );

        // DISTANCE_CALC
        let started = Instant::now();
        let origin = request.origin();
        let cctv = nearby_sorted(&sets.cctv, origin);
        let (nearest_police, police_source) =
            match self.nearest_police(&sets.grid_police, origin, reach).await {
                Ok(found) => found,
                Err(e) => {
                    recorder.record(Stage::DistanceCalc, StageOutcome::Failed, started, Some(e.to_string()));
                    return Err(e);
                }
            };
        let amenities_by_category = group_amenities(&sets.amenities, origin);
        recorder.record(
            Stage::DistanceCalc,
            StageOutcome::Success,
            started,
            Some(format!("nearest police from {}", police_source)),
        );

        // SCORE
        let started = Instant::now();
        let arrest_rate = district.arrest.map(|a| a.rate);
        let safety_score = self.scores.safety(&SafetyInputs {
            nearest_police_meters: nearest_police.as_ref().map(|p| p.distance_meters),
            cctv_installations: cctv.len(),
            arrest_rate,
        });
        let category_inputs: Vec<CategoryInputs> = amenities_by_category
            .iter()
            .map(|(category, places)| CategoryInputs {
                category: *category,
                count: places.len(),
                closest_meters: places.first().map(|p| p.distance_meters),
            })
            .collect();
        let convenience_score = self.scores.convenience(&category_inputs);
        recorder.record(
            Stage::Score,
            StageOutcome::Success,
            started,
            Some(format!(
                "safety={:.2} convenience={:.2}",
                safety_score.score, convenience_score.score
            )),
        );

        // RESPONSE_ASSEMBLE
        let started = Instant::now();
        let status = if district.address.is_some() {
            AnalysisStatus::Complete
        } else {
            AnalysisStatus::Partial
        };

        let categories: Vec<CategorySummary> = convenience_score
            .categories
            .iter()
            .map(|(category, value)| {
                let places = amenities_by_category.get(category).cloned().unwrap_or_default();
                CategorySummary {
                    category: *category,
                    name: category.display_name().to_string(),
                    count: places.len(),
                    closest_distance_meters: places.first().map(|p| p.distance_meters),
                    score: *value,
                    places,
                }
            })
            .collect();

        let safety = SafetyBreakdown {
            score: safety_score.score,
            components: safety_score.components,
            cctv_count: cctv.len(),
            grid_cctv_count: sets.grid_cctv.len(),
            camera_count: cctv.iter().filter_map(|c| c.camera_count).sum(),
            cctv,
            nearest_police,
            arrest_rate,
            arrest_data_found: district.arrest.map(|a| a.data_found).unwrap_or(false),
        };
        let convenience = ConvenienceBreakdown {
            score: convenience_score.score,
            categories,
        };

        let result = AnalysisResult {
            request_id,
            status,
            latitude: request.latitude,
            longitude: request.longitude,
            radius: request.radius,
            center_geohash,
            recommendations: recommendations(&safety, &convenience),
            warnings: warnings(&safety, status),
            overall_score: (safety.score + convenience.score) / 2.0,
            address: district.address,
            safety,
            convenience,
            from_cache: false,
            analyzed_at: Utc::now(),
        };
        recorder.record(Stage::ResponseAssemble, StageOutcome::Success, started, None);

        // L1_WRITE
        let started = Instant::now();
        if status != AnalysisStatus::Complete {
            recorder.record(Stage::L1Write, StageOutcome::Skipped, started, Some("partial".to_string()));
        } else if !l1_usable {
            recorder.record(Stage::L1Write, StageOutcome::Skipped, started, Some("cache unavailable".to_string()));
        } else {
            let written = write_json(
                self.response_cache.as_ref(),
                &l1_key,
                &result,
                self.settings.cache.response_ttl,
                self.settings.cache.write_timeout,
            )
            .await;
            let outcome = if written {
                StageOutcome::Success
            } else {
                StageOutcome::Failed
            };
            recorder.record(Stage::L1Write, outcome, started, None);
        }

        log::info!(
            "request_id={} done status={:?} safety={:.1} convenience={:.1}",
            request_id,
            result.status,
            result.safety.score,
            result.convenience.score
        );
        Ok(result)
    }

    /// L2_FETCH for all datasets
    async fn fetch_grid(
        &self,
        cells: &[String],
        recorder: &StageRecorder<'_>,
    ) -> Result<[GridFetch; 3], AnalysisError> {
        let started = Instant::now();
        let fetched = futures::try_join!(
            self.grid.get_by_cells(Dataset::Cctv, cells),
            self.grid.get_by_cells(Dataset::PoliceOffice, cells),
            self.grid.get_by_cells(Dataset::Amenity, cells),
        );

        match fetched {
            Ok((cctv, police, amenity)) => {
                let fetches = [cctv, police, amenity];
                let degraded = fetches.iter().any(|f| f.cache_degraded);
                let hits: usize = fetches.iter().map(|f| f.hits).sum();
                let misses: usize = fetches.iter().map(|f| f.misses).sum();
                let queries = fetches.iter().filter(|f| f.store_queried).count();
                let records: usize = fetches.iter().map(GridFetch::record_count).sum();
                let outcome = if degraded {
                    StageOutcome::Degraded
                } else if misses == 0 {
                    StageOutcome::Hit
                } else {
                    StageOutcome::Miss
                };
                recorder.record(
                    Stage::L2Fetch,
                    outcome,
                    started,
                    Some(format!(
                        "hits={} misses={} queries={} records={}",
                        hits, misses, queries, records
                    )),
                );
                Ok(fetches)
            }
            Err(e) => {
                recorder.record(Stage::L2Fetch, StageOutcome::Failed, started, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// GEOCODE then ARREST_RATE; a geocoder failure becomes an empty context
    async fn resolve_district(
        &self,
        request: &AnalysisRequest,
        recorder: &StageRecorder<'_>,
    ) -> Result<DistrictContext, AnalysisError> {
        let started = Instant::now();
        let resolution = match self
            .resolver
            .resolve(request.latitude, request.longitude)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                recorder.record(Stage::Geocode, StageOutcome::Degraded, started, Some(e.to_string()));
                recorder.record(
                    Stage::ArrestRate,
                    StageOutcome::Skipped,
                    Instant::now(),
                    Some("no address".to_string()),
                );
                return Ok(DistrictContext::default());
            }
        };
        let Resolution {
            address,
            cache_hit,
            cache_degraded,
        } = resolution;
        let outcome = match (cache_degraded, cache_hit) {
            (true, _) => StageOutcome::Degraded,
            (false, true) => StageOutcome::Hit,
            (false, false) => StageOutcome::Miss,
        };
        recorder.record(Stage::Geocode, outcome, started, address.district.clone());

        let started = Instant::now();
        let arrest = match address.district.as_deref() {
            Some(district) => match self.arrest_rates.rate_for(district).await {
                Ok(lookup) => {
                    let outcome = if lookup.cache_hit {
                        StageOutcome::Hit
                    } else {
                        StageOutcome::Miss
                    };
                    recorder.record(
                        Stage::ArrestRate,
                        outcome,
                        started,
                        Some(format!("{}={}", district, lookup.rate)),
                    );
                    lookup
                }
                Err(e) => {
                    recorder.record(Stage::ArrestRate, StageOutcome::Failed, started, Some(e.to_string()));
                    return Err(e);
                }
            },
            None => {
                recorder.record(
                    Stage::ArrestRate,
                    StageOutcome::Skipped,
                    started,
                    Some("no district".to_string()),
                );
                ArrestRateLookup {
                    rate: 0.0,
                    data_found: false,
                    cache_hit: false,
                }
            }
        };

        Ok(DistrictContext {
            address: Some(address),
            arrest: Some(arrest),
        })
    }

    /// Nearest police office
    /// DOCUMENTATION: An office inside the grid's guaranteed reach is the true
    /// nearest. Otherwise a closer one may sit just outside the block, or there
    /// is none in it at all, so the store is asked directly.
    async fn nearest_police(
        &self,
        grid_police: &[FacilityRecord],
        origin: Point<f64>,
        reach: f64,
    ) -> Result<(Option<NearbyFacility>, &'static str), AnalysisError> {
        let from_grid = nearby_sorted(grid_police, origin).into_iter().next();
        if let Some(police) = &from_grid {
            if police.distance_meters <= reach {
                return Ok((from_grid, "grid"));
            }
        }

        let from_store = self
            .store
            .find_nearest(Dataset::PoliceOffice, origin)
            .await?
            .map(|record| to_nearby(&record, origin));
        let nearest = from_grid
            .into_iter()
            .chain(from_store)
            .min_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        Ok((nearest, "store"))
    }

    fn filter(fetches: [GridFetch; 3], origin: Point<f64>, radius: f64) -> FacilitySets {
        let [cctv, police, amenity] = fetches;
        let grid_cctv = cctv.into_records();
        let grid_police = police.into_records();
        let grid_amenities = amenity.into_records();

        FacilitySets {
            cctv: filter_within_radius(&grid_cctv, origin, radius),
            amenities: filter_within_radius(&grid_amenities, origin, radius),
            grid_cctv,
            grid_police,
        }
    }
}

fn to_nearby(record: &FacilityRecord, origin: Point<f64>) -> NearbyFacility {
    NearbyFacility {
        id: record.id,
        name: record.name.clone(),
        address: record.address.clone(),
        latitude: record.latitude,
        longitude: record.longitude,
        distance_meters: haversine_distance(origin, record.point()),
        camera_count: (record.dataset() == Dataset::Cctv).then(|| record.camera_count()),
    }
}

/// Records annotated with distance, nearest first
fn nearby_sorted(records: &[FacilityRecord], origin: Point<f64>) -> Vec<NearbyFacility> {
    let mut nearby: Vec<NearbyFacility> = records.iter().map(|r| to_nearby(r, origin)).collect();
    nearby.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    nearby
}

fn group_amenities(
    records: &[FacilityRecord],
    origin: Point<f64>,
) -> BTreeMap<AmenityCategory, Vec<NearbyFacility>> {
    let mut grouped: BTreeMap<AmenityCategory, Vec<FacilityRecord>> = BTreeMap::new();
    for record in records {
        if let Some(category) = record.category() {
            grouped.entry(category).or_default().push(record.clone());
        }
    }
    grouped
        .into_iter()
        .map(|(category, records)| (category, nearby_sorted(&records, origin)))
        .collect()
}

fn recommendations(safety: &SafetyBreakdown, convenience: &ConvenienceBreakdown) -> Vec<String> {
    let mut out = Vec::new();

    if safety.score >= RECOMMEND_SAFETY_AT {
        out.push("이 지역은 안전 인프라가 잘 갖춰져 있습니다.".to_string());
    }
    if convenience.score >= RECOMMEND_CONVENIENCE_AT {
        out.push("주변에 다양한 편의시설이 있어 생활이 편리합니다.".to_string());
    }

    let closest = convenience
        .categories
        .iter()
        .filter_map(|c| c.closest_distance_meters.map(|d| (c, d)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((category, distance)) = closest {
        if distance < RECOMMEND_AMENITY_WITHIN_METERS {
            out.push(format!(
                "{}이(가) {}m 내에 있습니다.",
                category.name,
                distance.round() as u32
            ));
        }
    }

    out
}

fn warnings(safety: &SafetyBreakdown, status: AnalysisStatus) -> Vec<String> {
    let mut out = Vec::new();

    if safety.score < WARN_SAFETY_BELOW {
        out.push("안전 인프라가 부족한 지역입니다. 주의가 필요합니다.".to_string());
    }
    if let Some(police) = &safety.nearest_police {
        if police.distance_meters > WARN_POLICE_BEYOND_METERS {
            out.push("가장 가까운 파출소가 1km 이상 떨어져 있습니다.".to_string());
        }
    }
    if safety.camera_count < WARN_CAMERAS_BELOW {
        out.push("CCTV 설치 대수가 적은 편입니다.".to_string());
    }
    match safety.arrest_rate {
        Some(rate) if safety.arrest_data_found && rate < WARN_ARREST_RATE_BELOW => {
            out.push("해당 지역의 검거율이 낮은 편입니다.".to_string());
        }
        _ => {}
    }
    if status == AnalysisStatus::Partial {
        out.push("주소 정보를 확인하지 못해 검거율이 반영되지 않았습니다.".to_string());
    }

    out
}
