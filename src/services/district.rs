// src/services/district.rs
// DOCUMENTATION: Administrative district extraction
// PURPOSE: Pull the district name used by the arrest-rate table out of a
// free-form Korean address line

use crate::config::DistrictStrategy;

/// Address line -> district name
pub trait DistrictExtractor: Send + Sync {
    fn extract(&self, address: &str) -> Option<String>;

    /// Name shown in logs
    fn name(&self) -> &'static str;
}

/// Second whitespace-separated token
/// DOCUMENTATION: "서울특별시 중구 세종대로 110" -> "중구".
/// For "경기도 성남시 분당구 ..." this yields the city ("성남시").
pub struct SecondTokenExtractor;

impl DistrictExtractor for SecondTokenExtractor {
    fn extract(&self, address: &str) -> Option<String> {
        address.split_whitespace().nth(1).map(str::to_string)
    }

    fn name(&self) -> &'static str {
        "second-token"
    }
}

/// First token ending in "구"
/// DOCUMENTATION: Finds the borough in both "서울특별시 중구 ..." and
/// "경기도 성남시 분당구 ...", returns None for county-level addresses.
pub struct GuSuffixExtractor;

impl DistrictExtractor for GuSuffixExtractor {
    fn extract(&self, address: &str) -> Option<String> {
        address
            .split_whitespace()
            .find(|token| token.chars().count() > 1 && token.ends_with('구'))
            .map(str::to_string)
    }

    fn name(&self) -> &'static str {
        "gu-suffix"
    }
}

pub fn extractor_for(strategy: DistrictStrategy) -> Box<dyn DistrictExtractor> {
    match strategy {
        DistrictStrategy::SecondToken => Box::new(SecondTokenExtractor),
        DistrictStrategy::GuSuffix => Box::new(GuSuffixExtractor),
    }
}
