//! Scoring of models against the query terms, normalized by the theoretical model.

use std::sync::Arc;

use enum_map::EnumMap;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::{
    conf::Organism,
    pheno::{
        data::{GeneModel, Model, ModelScore, PhenotypeMatch},
        index::PhenotypeMatchIndex,
        reference::TheoreticalReferenceModel,
    },
};

/// Enum for the ways to fix query term count and normalization bounds.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
    strum::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScoringMode {
    /// Query and models use the same vocabulary.
    SameSpecies,
    /// Models of one other organism, only query terms with a match count.
    CrossSpecies,
    /// Models of several organisms, scaled to the ceiling of the human model.
    MultiCrossSpecies,
}

/// Scores models of one organism against the query terms.
///
/// The scorer holds no per-model state and can be shared between threads.
#[derive(Debug, Clone)]
pub struct ModelSimilarityScorer {
    mode: ScoringMode,
    reference: Arc<TheoreticalReferenceModel>,
    index: Arc<PhenotypeMatchIndex>,
    query_term_count: usize,
}

impl ModelSimilarityScorer {
    /// Scorer for models of the query's own organism.
    pub fn same_species(index: Arc<PhenotypeMatchIndex>) -> Self {
        let reference = Arc::new(TheoreticalReferenceModel::new(&index));
        let query_term_count = index.query_term_count();
        Self {
            mode: ScoringMode::SameSpecies,
            reference,
            index,
            query_term_count,
        }
    }

    /// Scorer for models of a single other organism.
    ///
    /// Only the query terms that have any match in the organism are counted.
    pub fn cross_species(index: Arc<PhenotypeMatchIndex>) -> Self {
        let reference = Arc::new(TheoreticalReferenceModel::new(&index));
        let query_term_count = index.matched_query_ids().len();
        Self {
            mode: ScoringMode::CrossSpecies,
            reference,
            index,
            query_term_count,
        }
    }

    /// Scorer for one of several organisms sharing the ceiling of `reference`.
    pub fn multi_cross_species(
        reference: Arc<TheoreticalReferenceModel>,
        index: Arc<PhenotypeMatchIndex>,
    ) -> Self {
        let query_term_count = reference.query_terms().len();
        Self {
            mode: ScoringMode::MultiCrossSpecies,
            reference,
            index,
            query_term_count,
        }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn reference(&self) -> &TheoreticalReferenceModel {
        &self.reference
    }

    pub fn index(&self) -> &PhenotypeMatchIndex {
        &self.index
    }

    pub fn query_term_count(&self) -> usize {
        self.query_term_count
    }

    /// Score `model` by forward and reciprocal best matches.
    ///
    /// Both directions accumulate into the same sum and maximum, so a term pair may be
    /// counted twice.  Repeated model terms count once per occurrence, matches with zero
    /// score are not reported.
    pub fn score<M: Model + Clone>(&self, model: &M) -> ModelScore<M> {
        let matched_organism_ids = self.index.matched_organism_ids();
        let query_ids = self.index.matched_query_ids();
        let model_ids = model
            .phenotype_ids()
            .iter()
            .filter(|id| matched_organism_ids.contains(id.as_str()))
            .map(String::as_str)
            .collect::<Vec<_>>();

        let mut best_for_term: IndexMap<&str, &PhenotypeMatch> = IndexMap::new();
        let mut max_score = 0f64;
        let mut sum_best_scores = 0f64;

        // forward: best model term for each query term
        for hp_id in query_ids {
            let mut best_score = 0f64;
            for mp_id in &model_ids {
                if let Some(m) = self.index.lookup(hp_id, mp_id).filter(|m| m.score > 0.0) {
                    best_score = best_score.max(m.score);
                    match best_for_term.get(m.query_id()) {
                        Some(best) if best.score >= m.score => (),
                        _ => {
                            best_for_term.insert(m.query_id(), m);
                        }
                    }
                }
            }
            if best_score > 0.0 {
                sum_best_scores += best_score;
                max_score = max_score.max(best_score);
            }
        }

        // reciprocal: best query term for each model term
        for mp_id in &model_ids {
            let best_score = query_ids
                .iter()
                .filter_map(|hp_id| self.index.lookup(hp_id, mp_id))
                .map(|m| m.score)
                .fold(0f64, f64::max);
            if best_score > 0.0 {
                sum_best_scores += best_score;
                max_score = max_score.max(best_score);
            }
        }

        let score = if sum_best_scores > 0.0 {
            let avg_score = sum_best_scores / (self.query_term_count + model_ids.len()) as f64;
            self.combined_score(max_score, avg_score)
        } else {
            0.0
        };

        ModelScore {
            score,
            model: model.clone(),
            best_matches: best_for_term.into_values().cloned().collect(),
        }
    }

    /// Score `model` via `PhenotypeMatchIndex::match_phenotype_ids`.
    ///
    /// Kept for comparison with older results, rounding and tie-breaking may differ from
    /// `score`.
    pub fn score_legacy<M: Model + Clone>(&self, model: &M) -> ModelScore<M> {
        let raw = self.index.match_phenotype_ids(model.phenotype_ids());
        let score = if raw.sum_scores > 0.0 {
            let avg_score =
                raw.sum_scores / (self.query_term_count + raw.matching_phenotype_ids.len()) as f64;
            self.combined_score(raw.max_score, avg_score)
        } else {
            0.0
        };

        ModelScore {
            score,
            model: model.clone(),
            best_matches: raw.best_matches,
        }
    }

    /// Score all `models` in parallel, best first.
    ///
    /// Models with equal score are ordered by their id.
    pub fn score_models<M>(&self, models: &[M]) -> Vec<ModelScore<M>>
    where
        M: Model + Clone + Send + Sync,
    {
        let mut result = models
            .par_iter()
            .map(|model| self.score(model))
            .collect::<Vec<_>>();
        sort_model_scores(&mut result);
        result
    }

    /// Combine maximal and average score into `[0, 1]` relative to the reference.
    fn combined_score(&self, max_score: f64, avg_score: f64) -> f64 {
        let combined = 50.0
            * (ratio(max_score, self.reference.max_match_score())
                + ratio(avg_score, self.reference.best_avg_score()));
        combined.min(100.0) / 100.0
    }
}

/// Quotient that is zero for a non-positive denominator.
fn ratio(value: f64, bound: f64) -> f64 {
    if bound > 0.0 {
        value / bound
    } else {
        0.0
    }
}

/// Sort by descending score, then by model id.
pub fn sort_model_scores<M: Model>(scores: &mut [ModelScore<M>]) {
    scores.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.model.id().cmp(b.model.id()))
    });
}

/// One scorer per organism for which matches are available.
///
/// With a single organism, human models are scored in same-species and other models in
/// cross-species mode.  With several organisms, all scorers share the human reference.
#[derive(Debug, Clone)]
pub struct OrganismScorers {
    scorers: EnumMap<Organism, Option<ModelSimilarityScorer>>,
}

impl OrganismScorers {
    /// Build the scorers.
    ///
    /// # Errors
    ///
    /// If several organisms are given but no human matches.
    pub fn new(
        indexes: EnumMap<Organism, Option<Arc<PhenotypeMatchIndex>>>,
    ) -> Result<Self, anyhow::Error> {
        let count = indexes.values().filter(|index| index.is_some()).count();
        let mut scorers: EnumMap<Organism, Option<ModelSimilarityScorer>> = EnumMap::default();

        if count > 1 {
            let human = indexes[Organism::Human].as_ref().ok_or_else(|| {
                anyhow::anyhow!("human phenotype matches required for scoring several organisms")
            })?;
            let reference = Arc::new(TheoreticalReferenceModel::new(human));
            for (organism, index) in indexes {
                scorers[organism] = index.map(|index| {
                    ModelSimilarityScorer::multi_cross_species(reference.clone(), index)
                });
            }
        } else {
            for (organism, index) in indexes {
                scorers[organism] = index.map(|index| match organism {
                    Organism::Human => ModelSimilarityScorer::same_species(index),
                    _ => ModelSimilarityScorer::cross_species(index),
                });
            }
        }

        Ok(Self { scorers })
    }

    /// Build the scorers with the same `mode` for all organisms.
    ///
    /// # Errors
    ///
    /// For `ScoringMode::MultiCrossSpecies` without human matches.
    pub fn with_mode(
        indexes: EnumMap<Organism, Option<Arc<PhenotypeMatchIndex>>>,
        mode: ScoringMode,
    ) -> Result<Self, anyhow::Error> {
        let reference = match (mode, indexes[Organism::Human].as_ref()) {
            (ScoringMode::MultiCrossSpecies, Some(human)) => {
                Some(Arc::new(TheoreticalReferenceModel::new(human)))
            }
            (ScoringMode::MultiCrossSpecies, None) => anyhow::bail!(
                "human phenotype matches required for mode {}",
                ScoringMode::MultiCrossSpecies
            ),
            _ => None,
        };

        let mut scorers: EnumMap<Organism, Option<ModelSimilarityScorer>> = EnumMap::default();
        for (organism, index) in indexes {
            scorers[organism] = index.map(|index| match (mode, reference.as_ref()) {
                (ScoringMode::MultiCrossSpecies, Some(reference)) => {
                    ModelSimilarityScorer::multi_cross_species(reference.clone(), index)
                }
                (ScoringMode::CrossSpecies, _) => ModelSimilarityScorer::cross_species(index),
                _ => ModelSimilarityScorer::same_species(index),
            });
        }

        Ok(Self { scorers })
    }

    pub fn get(&self, organism: Organism) -> Option<&ModelSimilarityScorer> {
        self.scorers[organism].as_ref()
    }

    /// Score gene models with the scorer of their organism, best first.
    ///
    /// Models of organisms without matches are skipped.
    pub fn score_gene_models(&self, models: &[GeneModel]) -> Vec<ModelScore<GeneModel>> {
        let mut result = models
            .par_iter()
            .filter_map(|model| self.get(model.organism).map(|scorer| scorer.score(model)))
            .collect::<Vec<_>>();
        sort_model_scores(&mut result);
        result
    }
}
