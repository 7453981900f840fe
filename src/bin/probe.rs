// src/bin/probe.rs
// DOCUMENTATION: Command-line probe for a running location-analysis service
// PURPOSE: Analyze a few coordinates (twice each, to show the response cache)
// and print a coloured summary
//
// Usage: probe [lat,lng ...]   (ANALYSIS_API_URL, PROBE_RADIUS from .env)

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};

// --- ANSI colours ---
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

const DEFAULT_TARGETS: [(&str, f64, f64); 3] = [
    ("서울시청", 37.5663, 126.9779),
    ("강남역", 37.4979, 127.0276),
    ("홍대입구역", 37.5572, 126.9245),
];

#[derive(Serialize)]
struct AnalysisPayload {
    latitude: f64,
    longitude: f64,
    radius: u32,
}

#[derive(Deserialize, Debug, Default)]
struct AddressView {
    road_address: Option<String>,
    jibun_address: Option<String>,
    district: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SafetyView {
    score: f64,
    cctv_count: usize,
    grid_cctv_count: usize,
    camera_count: u32,
    arrest_rate: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
struct ConvenienceView {
    score: f64,
}

#[derive(Deserialize, Debug)]
struct AnalysisView {
    status: String,
    center_geohash: String,
    address: Option<AddressView>,
    safety: SafetyView,
    convenience: ConvenienceView,
    overall_score: f64,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    from_cache: bool,
}

#[derive(Debug)]
struct ProbeResult {
    label: String,
    status: String,
    overall: f64,
    cold_ms: f64,
    warm_ms: f64,
    warm_cached: bool,
}

struct Probe {
    base_url: String,
    radius: u32,
    client: Client,
}

impl Probe {
    fn new(base_url: String, radius: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            base_url,
            radius,
            client,
        })
    }

    async fn check_service_health(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn analyze(&self, lat: f64, lng: f64) -> Result<(AnalysisView, f64)> {
        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/api/location-analysis", self.base_url))
            .json(&AnalysisPayload {
                latitude: lat,
                longitude: lng,
                radius: self.radius,
            })
            .send()
            .await
            .context("request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {} - {}", status, body);
        }

        let view = response
            .json::<AnalysisView>()
            .await
            .context("failed to parse analysis response")?;
        Ok((view, started.elapsed().as_secs_f64() * 1000.0))
    }

    fn print_analysis(&self, label: &str, view: &AnalysisView) {
        let status_colour = if view.status == "COMPLETE" { GREEN } else { YELLOW };
        println!(
            "{}📍 {}{} [{}] {}{}{}",
            BOLD, label, RESET, view.center_geohash, status_colour, view.status, RESET
        );

        if let Some(address) = &view.address {
            println!(
                "   주소: {} ({})",
                address
                    .road_address
                    .as_deref()
                    .or(address.jibun_address.as_deref())
                    .unwrap_or("-"),
                address.district.as_deref().unwrap_or("-")
            );
        }
        println!(
            "   안전 {:.1} | 편의 {:.1} | 종합 {}{:.1}{}",
            view.safety.score, view.convenience.score, BOLD, view.overall_score, RESET
        );
        println!(
            "   CCTV {}/{} installations, {} cameras, arrest rate {}",
            view.safety.cctv_count,
            view.safety.grid_cctv_count,
            view.safety.camera_count,
            view.safety
                .arrest_rate
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "-".to_string())
        );
        for rec in &view.recommendations {
            println!("   {}✔ {}{}", GREEN, rec, RESET);
        }
        for warning in &view.warnings {
            println!("   {}⚠ {}{}", YELLOW, warning, RESET);
        }
    }

    async fn run(&self, targets: &[(String, f64, f64)]) -> Vec<ProbeResult> {
        let mut results = Vec::new();

        for (label, lat, lng) in targets {
            let cold = self.analyze(*lat, *lng).await;
            let (view, cold_ms) = match cold {
                Ok(ok) => ok,
                Err(e) => {
                    println!("{}❌ {}: {:#}{}", RED, label, e, RESET);
                    continue;
                }
            };
            self.print_analysis(label, &view);

            let (warm_cached, warm_ms) = match self.analyze(*lat, *lng).await {
                Ok((again, ms)) => (again.from_cache, ms),
                Err(e) => {
                    println!("{}⚠ repeat request failed: {:#}{}", YELLOW, e, RESET);
                    (false, f64::NAN)
                }
            };
            println!();

            results.push(ProbeResult {
                label: label.clone(),
                status: view.status,
                overall: view.overall_score,
                cold_ms,
                warm_ms,
                warm_cached,
            });
        }

        results
    }

    fn print_summary(&self, results: &[ProbeResult]) {
        println!("{}📋 Summary (radius {}m){}", BOLD, self.radius, RESET);
        println!("──────────────────────────────────────────────────────────────────────");
        println!(
            "{:<20} {:<10} {:>8} {:>10} {:>10} {:>8}",
            "Location", "Status", "Overall", "Cold", "Warm", "Cached"
        );
        println!("──────────────────────────────────────────────────────────────────────");
        for r in results {
            println!(
                "{:<20} {:<10} {:>8.1} {:>8.1}ms {:>8.1}ms {:>8}",
                r.label,
                r.status,
                r.overall,
                r.cold_ms,
                r.warm_ms,
                if r.warm_cached { "yes" } else { "no" }
            );
        }
        println!("──────────────────────────────────────────────────────────────────────");
    }
}

fn parse_target(arg: &str) -> Result<(String, f64, f64)> {
    let (lat, lng) = arg
        .split_once(',')
        .with_context(|| format!("expected lat,lng but got '{}'", arg))?;
    let lat: f64 = lat.trim().parse().context("invalid latitude")?;
    let lng: f64 = lng.trim().parse().context("invalid longitude")?;
    Ok((arg.to_string(), lat, lng))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let base_url =
        env::var("ANALYSIS_API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let radius: u32 = env::var("PROBE_RADIUS")
        .ok()
        .and_then(|r| r.parse().ok())
        .unwrap_or(500);

    let args: Vec<String> = env::args().skip(1).collect();
    let targets: Vec<(String, f64, f64)> = if args.is_empty() {
        DEFAULT_TARGETS
            .iter()
            .map(|(label, lat, lng)| (label.to_string(), *lat, *lng))
            .collect()
    } else {
        args.iter()
            .map(|a| parse_target(a))
            .collect::<Result<_>>()?
    };

    let probe = Probe::new(base_url, radius)?;

    println!("\n{}🔍 Checking service status...{}", CYAN, RESET);
    if !probe.check_service_health().await {
        bail!("service unavailable at {}", probe.base_url);
    }
    println!("{}✅ Service available{}\n", GREEN, RESET);

    let results = probe.run(&targets).await;
    probe.print_summary(&results);
    Ok(())
}
