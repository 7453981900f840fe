// src/handlers/health.rs
// DOCUMENTATION: Health check handler
// PURPOSE: Liveness plus the active geohash precision and cache occupancy

use crate::services::{InMemoryCache, LocationAnalysisPipeline};
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::sync::Arc;

pub async fn health_check(
    pipeline: web::Data<LocationAnalysisPipeline>,
    cache: web::Data<Arc<InMemoryCache>>,
) -> impl Responder {
    let stats = cache.stats().await;

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "location-analysis",
        "version": env!("CARGO_PKG_VERSION"),
        "geohash_precision": pipeline.settings().geohash_precision,
        "cache": stats
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
