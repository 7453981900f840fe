// src/config/settings.rs
// DOCUMENTATION: Tunables of the analysis pipeline
// PURPOSE: One explicit settings object injected into every component so tests
// can override values deterministically

use crate::models::AmenityCategory;
use std::str::FromStr;
use std::time::Duration;

/// Top-level pipeline settings
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// Geohash length used for cell ids. Tier-2 keys embed cell ids, so
    /// changing this orphans every tier-2 entry.
    pub geohash_precision: usize,

    /// Largest accepted search radius
    pub max_radius_meters: u32,

    /// Upper bound on concurrent per-cell cache probes within one request
    pub max_parallel_cell_probes: usize,

    pub cache: CacheSettings,

    pub geocode: GeocodeSettings,

    pub weights: ScoreWeights,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            geohash_precision: 6,
            max_radius_meters: 500,
            max_parallel_cell_probes: 9,
            cache: CacheSettings::default(),
            geocode: GeocodeSettings::default(),
            weights: ScoreWeights::default(),
        }
    }
}

/// Time-to-live values for each cache namespace
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Tier 1: fully assembled results
    pub response_ttl: Duration,
    /// Tier 2: per-cell facility lists
    pub grid_ttl: Duration,
    pub geocode_ttl: Duration,
    pub arrest_rate_ttl: Duration,
    /// Bound on a single best-effort cache write
    pub write_timeout: Duration,
    /// Interval of the expired-entry sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            response_ttl: Duration::from_secs(5 * 60),
            grid_ttl: Duration::from_secs(24 * 60 * 60),
            geocode_ttl: Duration::from_secs(24 * 60 * 60),
            arrest_rate_ttl: Duration::from_secs(24 * 60 * 60),
            write_timeout: Duration::from_millis(250),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

/// How the administrative district is pulled out of an address line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistrictStrategy {
    /// Second whitespace-separated token ("서울특별시 중구 ..." -> "중구")
    SecondToken,
    /// First token ending in "구"
    GuSuffix,
}

impl FromStr for DistrictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "second-token" | "second_token" => Ok(DistrictStrategy::SecondToken),
            "gu-suffix" | "gu_suffix" => Ok(DistrictStrategy::GuSuffix),
            other => Err(format!("unknown district strategy: {}", other)),
        }
    }
}

/// Reverse geocoder settings
#[derive(Debug, Clone)]
pub struct GeocodeSettings {
    pub api_key: String,
    pub base_url: String,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Decimal places kept when building the geocode cache key
    pub coordinate_decimals: u32,
    /// Outbound request budget
    pub requests_per_second: u32,
    pub district_strategy: DistrictStrategy,
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://dapi.kakao.com".to_string(),
            connect_timeout: Duration::from_secs(3),
            response_timeout: Duration::from_secs(5),
            coordinate_decimals: 4,
            requests_per_second: 10,
            district_strategy: DistrictStrategy::SecondToken,
        }
    }
}

/// Metric-specific mapping of a raw value onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalizer {
    /// count / cap, saturating at 1
    Saturating { cap: f64 },
    /// 1 within `full_within` meters of the nearest place, decaying linearly to
    /// 0 at `zero_beyond`; 0 when nothing was found
    DistanceDecay { full_within: f64, zero_beyond: f64 },
    /// Half proximity (full when the nearest place is within `near_within`,
    /// half otherwise), half saturating count
    CountAndProximity { cap: f64, near_within: f64 },
}

/// Weight and normalizer for one amenity category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryRule {
    pub category: AmenityCategory,
    pub weight: f64,
    pub normalizer: Normalizer,
}

/// Safety metric weights and normalization thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyWeights {
    pub police_distance: f64,
    pub cctv: f64,
    pub arrest_rate: f64,
    /// Police distance at which the distance metric reaches 0
    pub police_distance_zero_meters: f64,
    /// CCTV installation count at which the CCTV metric saturates
    pub cctv_saturation: f64,
}

impl Default for SafetyWeights {
    fn default() -> Self {
        Self {
            police_distance: 0.3,
            cctv: 0.4,
            arrest_rate: 0.3,
            police_distance_zero_meters: 800.0,
            cctv_saturation: 30.0,
        }
    }
}

/// All score weights
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWeights {
    pub safety: SafetyWeights,
    pub convenience: Vec<CategoryRule>,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            safety: SafetyWeights::default(),
            convenience: default_category_rules(),
        }
    }
}

impl ScoreWeights {
    /// Override category weights by category code; unknown codes are reported back
    pub fn apply_convenience_overrides<'a, I>(&mut self, overrides: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut unknown = Vec::new();
        for (code, weight) in overrides {
            match self
                .convenience
                .iter_mut()
                .find(|rule| rule.category.code() == code)
            {
                Some(rule) => rule.weight = weight.max(0.0),
                None => unknown.push(code.to_string()),
            }
        }
        unknown
    }
}

fn default_category_rules() -> Vec<CategoryRule> {
    use AmenityCategory::*;

    let saturating = |category, cap| CategoryRule {
        category,
        weight: 1.0,
        normalizer: Normalizer::Saturating { cap },
    };

    vec![
        CategoryRule {
            category: SubwayStation,
            weight: 1.0,
            normalizer: Normalizer::DistanceDecay {
                full_within: 500.0,
                zero_beyond: 2000.0,
            },
        },
        saturating(ConvenienceStore, 20.0),
        saturating(Restaurant, 100.0),
        saturating(Cafe, 50.0),
        saturating(LargeMart, 10.0),
        saturating(Bank, 20.0),
        saturating(PublicOffice, 33.0),
        saturating(CulturalFacility, 25.0),
        CategoryRule {
            category: Hospital,
            weight: 1.0,
            normalizer: Normalizer::CountAndProximity {
                cap: 5.0,
                near_within: 1000.0,
            },
        },
        saturating(Pharmacy, 12.5),
        saturating(Parking, 33.0),
        saturating(GasStation, 20.0),
        saturating(School, 50.0),
        saturating(Academy, 100.0),
        saturating(Attraction, 33.0),
    ]
}
