// src/handlers/mod.rs
// DOCUMENTATION: Handlers module organization
// PURPOSE: Re-export handler components

pub mod analysis;
pub mod health;

pub use analysis::config as analysis_config;
pub use health::config as health_config;
