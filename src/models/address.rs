// src/models/address.rs
// DOCUMENTATION: Reverse geocoding results

use serde::{Deserialize, Serialize};

/// Raw address pair returned by the reverse geocoder
/// DOCUMENTATION: This is what the geocode cache stores; the district is
/// derived later so that changing the extraction strategy never requires
/// invalidating cached addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    /// Road-name address (e.g. "서울특별시 중구 세종대로 110")
    pub road_address: Option<String>,
    /// Lot-number (jibun) address
    pub jibun_address: Option<String>,
}

impl GeocodedAddress {
    /// Preferred address line: road address, falling back to jibun
    pub fn primary(&self) -> Option<&str> {
        self.road_address
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.jibun_address.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// Address plus derived administrative district
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub road_address: Option<String>,
    pub jibun_address: Option<String>,
    pub district: Option<String>,
}
