//! Protein interaction network proximity of phenotype hits.

pub mod cli;
pub mod loader;
pub mod matrix;
pub mod rocks;
pub mod scorer;
