// src/models/analysis.rs
// DOCUMENTATION: Request/response models for location analysis
// PURPOSE: Inbound validation and the assembled analysis result

use crate::errors::AnalysisError;
use crate::models::{AmenityCategory, ResolvedAddress};
use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request DTO for POST /api/location-analysis
/// DOCUMENTATION: One per call; checked before entering the pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct AnalysisRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    /// Search radius in meters
    #[serde(alias = "radiusMeters", alias = "radius_meters")]
    #[validate(range(min = 1))]
    pub radius: u32,
}

impl AnalysisRequest {
    pub fn new(latitude: f64, longitude: f64, radius: u32) -> Self {
        Self {
            latitude,
            longitude,
            radius,
        }
    }

    /// Boundary validation
    /// DOCUMENTATION: Out-of-range coordinates become `InvalidCoordinate`,
    /// bad radii become `ValidationError`; both are client errors.
    pub fn check(&self, max_radius_meters: u32) -> Result<(), AnalysisError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(AnalysisError::InvalidCoordinate(format!(
                "coordinate must be finite: ({}, {})",
                self.latitude, self.longitude
            )));
        }

        if let Err(errors) = self.validate() {
            let fields = errors.field_errors();
            if fields.contains_key("latitude") || fields.contains_key("longitude") {
                return Err(AnalysisError::InvalidCoordinate(format!(
                    "latitude must be within [-90, 90] and longitude within [-180, 180]: ({}, {})",
                    self.latitude, self.longitude
                )));
            }
            return Err(AnalysisError::ValidationError(errors.to_string()));
        }

        if self.radius > max_radius_meters {
            return Err(AnalysisError::ValidationError(format!(
                "radius {}m exceeds maximum of {}m",
                self.radius, max_radius_meters
            )));
        }

        Ok(())
    }

    pub fn origin(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Outcome flag of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    /// Every stage succeeded
    Complete,
    /// Reverse geocoding failed; address and arrest rate are missing
    Partial,
}

/// A facility annotated with its exact distance from the request origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyFacility {
    pub id: i64,
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_count: Option<u32>,
}

/// Per-metric normalized contributions to the safety score, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyComponents {
    pub police_distance: f64,
    pub cctv: f64,
    /// Absent when the district (and so the arrest rate) is unknown
    pub arrest_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyBreakdown {
    /// 0..=100
    pub score: f64,
    pub components: SafetyComponents,
    /// CCTV installations within the radius
    pub cctv_count: usize,
    /// CCTV installations in the 9-block grid before radius filtering
    pub grid_cctv_count: usize,
    /// Total cameras across the installations within the radius
    pub camera_count: u32,
    pub cctv: Vec<NearbyFacility>,
    pub nearest_police: Option<NearbyFacility>,
    pub arrest_rate: Option<f64>,
    pub arrest_data_found: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: AmenityCategory,
    pub name: String,
    pub count: usize,
    pub closest_distance_meters: Option<f64>,
    /// Normalized category value in [0, 1]
    pub score: f64,
    /// Sorted by ascending distance
    pub places: Vec<NearbyFacility>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvenienceBreakdown {
    /// 0..=100
    pub score: f64,
    pub categories: Vec<CategorySummary>,
}

/// Fully assembled analysis result
/// DOCUMENTATION: This is the value stored in the tier-1 response cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub status: AnalysisStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: u32,
    pub center_geohash: String,
    pub address: Option<ResolvedAddress>,
    pub safety: SafetyBreakdown,
    pub convenience: ConvenienceBreakdown,
    /// Mean of safety and convenience
    pub overall_score: f64,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
    /// Set when served from the response cache
    #[serde(default)]
    pub from_cache: bool,
    pub analyzed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_passes() {
        assert!(AnalysisRequest::new(37.5663, 126.9779, 500).check(500).is_ok());
        assert!(AnalysisRequest::new(-90.0, 180.0, 1).check(500).is_ok());
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let err = AnalysisRequest::new(91.0, 126.9779, 500).check(500).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidCoordinate(_)));

        let err = AnalysisRequest::new(37.5, -180.5, 500).check(500).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidCoordinate(_)));

        let err = AnalysisRequest::new(f64::NAN, 0.0, 500).check(500).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidCoordinate(_)));
    }

    #[test]
    fn test_radius_bounds() {
        let err = AnalysisRequest::new(37.5, 127.0, 0).check(500).unwrap_err();
        assert!(matches!(err, AnalysisError::ValidationError(_)));

        let err = AnalysisRequest::new(37.5, 127.0, 501).check(500).unwrap_err();
        assert!(matches!(err, AnalysisError::ValidationError(_)));
    }

    #[test]
    fn test_request_accepts_radius_aliases() {
        let req: AnalysisRequest =
            serde_json::from_str(r#"{"latitude":37.5,"longitude":127.0,"radiusMeters":300}"#)
                .unwrap();
        assert_eq!(req.radius, 300);
    }
}
