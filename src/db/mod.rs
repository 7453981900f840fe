// src/db/mod.rs
// DOCUMENTATION: Database module organization
// PURPOSE: Re-export database components

pub mod arrest_rate_repository;
pub mod facility_repository;

pub use arrest_rate_repository::*;
pub use facility_repository::*;
