// src/models/facility.rs
// DOCUMENTATION: Facility records ingested by the ETL loaders
// PURPOSE: Typed view of the geohash-tagged reference tables (CCTV, police, amenities)

use geo_types::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference datasets served from the spatial store
/// DOCUMENTATION: Each dataset maps to one table and one tier-2 cache namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Cctv,
    PoliceOffice,
    Amenity,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Cctv, Dataset::PoliceOffice, Dataset::Amenity];

    /// Name used in cache keys and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Cctv => "cctv",
            Dataset::PoliceOffice => "police",
            Dataset::Amenity => "amenity",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amenity category, keyed by the Kakao local category group code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AmenityCategory {
    #[serde(rename = "SW8")]
    SubwayStation,
    #[serde(rename = "CS2")]
    ConvenienceStore,
    #[serde(rename = "FD6")]
    Restaurant,
    #[serde(rename = "CE7")]
    Cafe,
    #[serde(rename = "MT1")]
    LargeMart,
    #[serde(rename = "BK9")]
    Bank,
    #[serde(rename = "PO3")]
    PublicOffice,
    #[serde(rename = "CT1")]
    CulturalFacility,
    #[serde(rename = "HP8")]
    Hospital,
    #[serde(rename = "PM9")]
    Pharmacy,
    #[serde(rename = "PK6")]
    Parking,
    #[serde(rename = "OL7")]
    GasStation,
    #[serde(rename = "SC4")]
    School,
    #[serde(rename = "AC5")]
    Academy,
    #[serde(rename = "AT4")]
    Attraction,
}

impl AmenityCategory {
    pub const ALL: [AmenityCategory; 15] = [
        AmenityCategory::SubwayStation,
        AmenityCategory::ConvenienceStore,
        AmenityCategory::Restaurant,
        AmenityCategory::Cafe,
        AmenityCategory::LargeMart,
        AmenityCategory::Bank,
        AmenityCategory::PublicOffice,
        AmenityCategory::CulturalFacility,
        AmenityCategory::Hospital,
        AmenityCategory::Pharmacy,
        AmenityCategory::Parking,
        AmenityCategory::GasStation,
        AmenityCategory::School,
        AmenityCategory::Academy,
        AmenityCategory::Attraction,
    ];

    /// Category group code as stored in `amenity_geo.category_code`
    pub fn code(&self) -> &'static str {
        match self {
            AmenityCategory::SubwayStation => "SW8",
            AmenityCategory::ConvenienceStore => "CS2",
            AmenityCategory::Restaurant => "FD6",
            AmenityCategory::Cafe => "CE7",
            AmenityCategory::LargeMart => "MT1",
            AmenityCategory::Bank => "BK9",
            AmenityCategory::PublicOffice => "PO3",
            AmenityCategory::CulturalFacility => "CT1",
            AmenityCategory::Hospital => "HP8",
            AmenityCategory::Pharmacy => "PM9",
            AmenityCategory::Parking => "PK6",
            AmenityCategory::GasStation => "OL7",
            AmenityCategory::School => "SC4",
            AmenityCategory::Academy => "AC5",
            AmenityCategory::Attraction => "AT4",
        }
    }

    /// Korean display name shown to end users
    pub fn display_name(&self) -> &'static str {
        match self {
            AmenityCategory::SubwayStation => "지하철역",
            AmenityCategory::ConvenienceStore => "편의점",
            AmenityCategory::Restaurant => "음식점",
            AmenityCategory::Cafe => "카페",
            AmenityCategory::LargeMart => "대형마트",
            AmenityCategory::Bank => "은행",
            AmenityCategory::PublicOffice => "공공기관",
            AmenityCategory::CulturalFacility => "문화시설",
            AmenityCategory::Hospital => "병원",
            AmenityCategory::Pharmacy => "약국",
            AmenityCategory::Parking => "주차장",
            AmenityCategory::GasStation => "주유소",
            AmenityCategory::School => "학교",
            AmenityCategory::Academy => "학원",
            AmenityCategory::Attraction => "관광명소",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code.trim())
    }
}

/// Dataset-specific attributes of a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FacilityAttributes {
    Cctv { camera_count: u32 },
    PoliceOffice,
    Amenity { category: AmenityCategory },
}

/// A single facility row
/// DOCUMENTATION: Created once at ingestion time with a precomputed geohash id;
/// immutable from the analysis pipeline's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: i64,

    /// Geohash cell at the system-wide precision
    pub geohash_id: String,

    pub latitude: f64,

    pub longitude: f64,

    /// Station or place name (police offices and amenities)
    pub name: Option<String>,

    pub address: Option<String>,

    pub attributes: FacilityAttributes,
}

impl FacilityRecord {
    pub fn dataset(&self) -> Dataset {
        match self.attributes {
            FacilityAttributes::Cctv { .. } => Dataset::Cctv,
            FacilityAttributes::PoliceOffice => Dataset::PoliceOffice,
            FacilityAttributes::Amenity { .. } => Dataset::Amenity,
        }
    }

    /// Location as a geo point (x = longitude, y = latitude)
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Number of cameras at a CCTV installation, 0 for other datasets
    pub fn camera_count(&self) -> u32 {
        match self.attributes {
            FacilityAttributes::Cctv { camera_count } => camera_count,
            _ => 0,
        }
    }

    pub fn category(&self) -> Option<AmenityCategory> {
        match self.attributes {
            FacilityAttributes::Amenity { category } => Some(category),
            _ => None,
        }
    }
}
