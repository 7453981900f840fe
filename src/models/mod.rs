// src/models/mod.rs
// DOCUMENTATION: Models module organization
// PURPOSE: Re-export model components

pub mod address;
pub mod analysis;
pub mod facility;

pub use address::*;
pub use analysis::*;
pub use facility::*;
