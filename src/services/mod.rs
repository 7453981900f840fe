// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod address_resolver;
pub mod arrest_rate_service;
pub mod cache;
pub mod district;
pub mod geocode_client;
pub mod geohash;
pub mod grid_cache;
pub mod observer;
pub mod pipeline;
pub mod score_engine;
#[cfg(test)]
pub mod testing;

pub use cache::{start_cleanup_task, InMemoryCache, KeyValueCache};
pub use geocode_client::{KakaoGeocodeClient, ReverseGeocoder};
pub use observer::{LogStageObserver, StageObserver};
pub use pipeline::LocationAnalysisPipeline;
