// src/services/geocode_client.rs
// DOCUMENTATION: Kakao Local reverse geocoding client
// PURPOSE: Convert a coordinate into road and jibun address lines

use crate::config::GeocodeSettings;
use crate::errors::AnalysisError;
use crate::models::GeocodedAddress;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;

/// Coordinate -> address adapter
/// DOCUMENTATION: Any network, status or parse failure is reported as
/// `GeocodeUnavailable`. A coordinate with no address (e.g. open sea) is a
/// successful lookup with both lines empty.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<GeocodedAddress, AnalysisError>;
}

/// Response from /v2/local/geo/coord2address.json
#[derive(Debug, Deserialize)]
pub struct Coord2AddressResponse {
    #[serde(default)]
    pub documents: Vec<Coord2AddressDocument>,
}

#[derive(Debug, Deserialize)]
pub struct Coord2AddressDocument {
    pub road_address: Option<KakaoAddressName>,
    pub address: Option<KakaoAddressName>,
}

#[derive(Debug, Deserialize)]
pub struct KakaoAddressName {
    pub address_name: String,
}

impl Coord2AddressResponse {
    /// First document wins; blank address names count as missing
    pub fn into_address(self) -> GeocodedAddress {
        let non_blank = |name: Option<KakaoAddressName>| {
            name.map(|n| n.address_name.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        match self.documents.into_iter().next() {
            Some(doc) => GeocodedAddress {
                road_address: non_blank(doc.road_address),
                jibun_address: non_blank(doc.address),
            },
            None => GeocodedAddress::default(),
        }
    }
}

/// Kakao reverse geocoding client
/// DOCUMENTATION: Carries connect/response timeouts and a shared outbound
/// rate limit so a burst of cold requests cannot exhaust the API quota
pub struct KakaoGeocodeClient {
    client: Client,
    api_key: String,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl KakaoGeocodeClient {
    pub fn new(settings: &GeocodeSettings) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.response_timeout)
            .build()
            .map_err(|e| AnalysisError::InternalError(format!("HTTP client init failed: {}", e)))?;

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for KakaoGeocodeClient {
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<GeocodedAddress, AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::GeocodeUnavailable(
                "KAKAO_API_KEY is not configured".to_string(),
            ));
        }

        self.limiter.until_ready().await;

        let url = format!("{}/v2/local/geo/coord2address.json", self.base_url);
        log::debug!("Kakao coord2address: lat={}, lng={}", lat, lng);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .query(&[("x", lng.to_string()), ("y", lat.to_string())])
            .send()
            .await
            .map_err(|e| {
                log::error!("Kakao coord2address request failed: {}", e);
                AnalysisError::GeocodeUnavailable(format!("Request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("Kakao coord2address error {}: {}", status, body);
            return Err(AnalysisError::GeocodeUnavailable(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let parsed: Coord2AddressResponse = response.json().await.map_err(|e| {
            log::error!("Failed to parse Kakao coord2address response: {}", e);
            AnalysisError::GeocodeUnavailable(format!("Parse error: {}", e))
        })?;

        let address = parsed.into_address();
        if address.primary().is_none() {
            log::warn!("No address found for coordinate ({}, {})", lat, lng);
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coord2address_response() {
        let body = r#"{
            "meta": {"total_count": 1},
            "documents": [{
                "road_address": {"address_name": "서울특별시 중구 세종대로 110", "building_name": "서울특별시청"},
                "address": {"address_name": "서울특별시 중구 태평로1가 31"}
            }]
        }"#;
        let parsed: Coord2AddressResponse = serde_json::from_str(body).unwrap();
        let address = parsed.into_address();

        assert_eq!(address.road_address.as_deref(), Some("서울특별시 중구 세종대로 110"));
        assert_eq!(address.jibun_address.as_deref(), Some("서울특별시 중구 태평로1가 31"));
    }

    #[test]
    fn test_missing_road_address_falls_back_to_jibun() {
        let body = r#"{"documents": [{"road_address": null, "address": {"address_name": "경기도 성남시 분당구 정자동 178-1"}}]}"#;
        let parsed: Coord2AddressResponse = serde_json::from_str(body).unwrap();
        let address = parsed.into_address();

        assert!(address.road_address.is_none());
        assert_eq!(address.primary(), Some("경기도 성남시 분당구 정자동 178-1"));
    }

    #[test]
    fn test_empty_documents_is_empty_address() {
        let parsed: Coord2AddressResponse = serde_json::from_str(r#"{"documents": []}"#).unwrap();
        assert_eq!(parsed.into_address(), GeocodedAddress::default());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let client = KakaoGeocodeClient::new(&GeocodeSettings::default()).unwrap();
        let err = client.reverse_geocode(37.5663, 126.9779).await.unwrap_err();
        assert!(matches!(err, AnalysisError::GeocodeUnavailable(_)));
    }
}
