//! Phenotype similarity matching and model scoring.

pub mod cli;
pub mod data;
pub mod index;
pub mod reference;
pub mod scorer;
