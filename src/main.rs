// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, database, cache and pipeline, then start the HTTP server

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod services;

use actix_web::{middleware::Logger, web, App, HttpServer};
use config::Config;
use db::{FacilityStore, PgArrestRateRepository, PgFacilityStore};
use dotenv::dotenv;
use services::{
    start_cleanup_task, InMemoryCache, KakaoGeocodeClient, LocationAnalysisPipeline,
    LogStageObserver,
};
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            config.log_level.as_str()
        } else {
            "info,actix_web=info,sqlx=warn"
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    log::info!("Starting location-analysis service...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );
    log::info!(
        "Geohash precision {} (max radius {}m), district strategy {:?}",
        config.analysis.geohash_precision,
        config.analysis.max_radius_meters,
        config.analysis.geocode.district_strategy
    );

    // 4. Initialize database connection pool
    let pool = match config::init_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    // 5. Shared cache for all namespaces
    let cache = Arc::new(InMemoryCache::new());
    start_cleanup_task(cache.clone(), config.analysis.cache.cleanup_interval);
    log::info!(
        "Started cache cleanup task (interval: {}s)",
        config.analysis.cache.cleanup_interval.as_secs()
    );

    // 6. Pipeline collaborators
    let geocoder = match KakaoGeocodeClient::new(&config.analysis.geocode) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("Failed to build geocoding client: {}", e);
            std::process::exit(1);
        }
    };
    let store: Arc<dyn FacilityStore> = Arc::new(PgFacilityStore::new(pool.clone()));
    let pipeline = web::Data::new(LocationAnalysisPipeline::new(
        config.analysis.clone(),
        cache.clone(),
        store.clone(),
        geocoder,
        Arc::new(PgArrestRateRepository::new(pool)),
        Arc::new(LogStageObserver),
    ));
    let store_data: web::Data<dyn FacilityStore> = web::Data::from(store);

    // 7. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);

    HttpServer::new(move || {
        App::new()
            // Application state (pipeline, facility store, cache)
            .app_data(pipeline.clone())
            .app_data(store_data.clone())
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                errors::AnalysisError::ValidationError(err.to_string()).into()
            }))
            // Middleware
            .wrap(Logger::default())
            .wrap(actix_web::middleware::Compress::default())
            // Routes
            .configure(handlers::health_config)
            .configure(handlers::analysis_config)
    })
    .bind(&server_addr)?
    .run()
    .await
}
