// src/services/observer.rs
// DOCUMENTATION: Pipeline stage events
// PURPOSE: Per-stage timing and outcome records, kept out of the pipeline
// logic so tests can record them and production can log them

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    L1Check,
    GridBuild,
    L2Fetch,
    RadiusFilter,
    Geocode,
    ArrestRate,
    DistanceCalc,
    Score,
    ResponseAssemble,
    L1Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::L1Check => "L1_CHECK",
            Stage::GridBuild => "GRID_BUILD",
            Stage::L2Fetch => "L2_FETCH",
            Stage::RadiusFilter => "RADIUS_FILTER",
            Stage::Geocode => "GEOCODE",
            Stage::ArrestRate => "ARREST_RATE",
            Stage::DistanceCalc => "DISTANCE_CALC",
            Stage::Score => "SCORE",
            Stage::ResponseAssemble => "RESPONSE_ASSEMBLE",
            Stage::L1Write => "L1_WRITE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Hit,
    Miss,
    Success,
    /// Finished, but a non-fatal dependency failed (cache down, geocoder down)
    Degraded,
    Skipped,
    Failed,
}

/// One stage record
#[derive(Debug, Clone, Serialize)]
pub struct StageEvent {
    pub request_id: Uuid,
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub duration: Duration,
    pub detail: Option<String>,
}

/// Sink for stage events
pub trait StageObserver: Send + Sync {
    fn on_stage(&self, event: &StageEvent);
}

/// Default observer: one structured log line per stage
/// DOCUMENTATION: Failures log at warn, everything else at debug so a
/// healthy service stays quiet at the default `info` filter
pub struct LogStageObserver;

impl StageObserver for LogStageObserver {
    fn on_stage(&self, event: &StageEvent) {
        let level = match event.outcome {
            StageOutcome::Failed | StageOutcome::Degraded => log::Level::Warn,
            _ => log::Level::Debug,
        };

        log::log!(
            level,
            "request_id={} stage={} outcome={:?} duration_ms={:.2} detail={}",
            event.request_id,
            event.stage,
            event.outcome,
            event.duration.as_secs_f64() * 1000.0,
            event.detail.as_deref().unwrap_or("-")
        );
    }
}
