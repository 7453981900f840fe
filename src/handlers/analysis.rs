// src/handlers/analysis.rs
// DOCUMENTATION: HTTP handlers for location analysis
// PURPOSE: Parse requests, call the pipeline, return responses

use crate::db::FacilityStore;
use crate::errors::AnalysisError;
use crate::models::{AnalysisRequest, Dataset, FacilityRecord};
use crate::services::LocationAnalysisPipeline;
use actix_web::{web, HttpResponse, Responder};
use geojson::{feature, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

/// POST /api/location-analysis
/// Analyze safety and convenience around a coordinate
pub async fn analyze_location(
    pipeline: web::Data<LocationAnalysisPipeline>,
    req: web::Json<AnalysisRequest>,
) -> Result<impl Responder, AnalysisError> {
    let result = pipeline.analyze(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/police-offices
/// Every police office as a GeoJSON FeatureCollection
pub async fn police_offices(
    store: web::Data<dyn FacilityStore>,
) -> Result<impl Responder, AnalysisError> {
    let offices = store.find_all(Dataset::PoliceOffice).await?;
    log::debug!("Serving {} police offices", offices.len());
    Ok(HttpResponse::Ok().json(to_feature_collection(&offices)))
}

fn to_feature(record: &FacilityRecord) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), json!(record.name));
    properties.insert("address".to_string(), json!(record.address));
    properties.insert("geohash".to_string(), json!(record.geohash_id));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![
            record.longitude,
            record.latitude,
        ]))),
        id: Some(feature::Id::Number(record.id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn to_feature_collection(records: &[FacilityRecord]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records.iter().map(to_feature).collect(),
        foreign_members: None,
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/location-analysis", web::post().to(analyze_location))
            .route("/police-offices", web::get().to(police_offices)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisSettings;
    use crate::services::cache::InMemoryCache;
    use crate::services::observer::LogStageObserver;
    use crate::services::testing::*;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;

    const LAT: f64 = 37.5663;
    const LNG: f64 = 126.9779;

    fn app_data() -> (
        web::Data<LocationAnalysisPipeline>,
        web::Data<dyn FacilityStore>,
    ) {
        let store: Arc<dyn FacilityStore> = Arc::new(CountingStore::new(vec![
            cctv_at(1, LAT, LNG, 120.0, 2),
            police_at(10, "태평로파출소", LAT, LNG, -250.0),
        ]));
        let pipeline = LocationAnalysisPipeline::new(
            AnalysisSettings {
                geohash_precision: FIXTURE_PRECISION,
                ..AnalysisSettings::default()
            },
            Arc::new(InMemoryCache::new()),
            store.clone(),
            Arc::new(ScriptedGeocoder::road("서울특별시 중구 세종대로 110")),
            Arc::new(FixedArrestRates::new(&[("중구", 0.72)])),
            Arc::new(LogStageObserver),
        );
        (web::Data::new(pipeline), web::Data::from(store))
    }

    #[actix_rt::test]
    async fn test_analyze_endpoint() {
        let (pipeline, store) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(pipeline)
                .app_data(store)
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/location-analysis")
            .set_json(json!({"latitude": LAT, "longitude": LNG, "radius": 500}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "COMPLETE");
        assert_eq!(body["safety"]["cctv_count"], 1);
        assert_eq!(body["address"]["district"], "중구");
    }

    #[actix_rt::test]
    async fn test_invalid_coordinate_is_bad_request() {
        let (pipeline, store) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(pipeline)
                .app_data(store)
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/location-analysis")
            .set_json(json!({"latitude": 123.0, "longitude": LNG, "radius": 500}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_COORDINATE");
    }

    #[actix_rt::test]
    async fn test_police_offices_geojson() {
        let (pipeline, store) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(pipeline)
                .app_data(store)
                .configure(config),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/police-offices").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 1);
        assert_eq!(body["features"][0]["geometry"]["type"], "Point");
        assert_eq!(body["features"][0]["properties"]["name"], "태평로파출소");
    }
}
