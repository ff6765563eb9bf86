//! Organisms and tunable settings of the prioritization.

use clap::ValueEnum;
use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Enum for the organisms whose phenotype vocabularies can be matched.
#[derive(
    Serialize,
    Deserialize,
    Enum,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    Debug,
    Default,
    EnumString,
    ValueEnum,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Organism {
    /// Homo sapiens (HPO)
    #[default]
    Human,
    /// Mus musculus (MPO)
    Mouse,
    /// Danio rerio (ZPO)
    Fish,
}

/// Default for `NetworkConf::high_quality_cutoff`.
pub const DEFAULT_HIGH_QUALITY_CUTOFF: f64 = 0.6;

/// Default for `NetworkConf::walker_bias`.
pub const DEFAULT_WALKER_BIAS: f64 = 0.5;

/// Whether a query whose weighted network values are all zero still yields the first
/// candidate gene (rather than no hit).
pub const ZERO_SCORE_FALLBACK_TO_FIRST_CANDIDATE: bool = true;

/// Settings for the network proximity scoring.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
#[serde(default)]
pub struct NetworkConf {
    /// Phenotype scores must exceed this value for a gene to seed the network.
    pub high_quality_cutoff: f64,
    /// Constant added to the weighted network value of the closest gene.
    pub walker_bias: f64,
    /// See `ZERO_SCORE_FALLBACK_TO_FIRST_CANDIDATE`.
    pub zero_score_fallback: bool,
}

impl Default for NetworkConf {
    fn default() -> Self {
        Self {
            high_quality_cutoff: DEFAULT_HIGH_QUALITY_CUTOFF,
            walker_bias: DEFAULT_WALKER_BIAS,
            zero_score_fallback: ZERO_SCORE_FALLBACK_TO_FIRST_CANDIDATE,
        }
    }
}

impl NetworkConf {
    /// Load from a JSON file, missing fields take their defaults.
    pub fn from_json_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("error reading {:?}: {}", path.as_ref(), e))?;
        serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("error parsing {:?}: {}", path.as_ref(), e))
    }
}
