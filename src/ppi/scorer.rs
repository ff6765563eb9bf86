//! Propagation of phenotype evidence to neighboring genes in the interaction network.

use std::sync::Arc;

use indexmap::IndexMap;
use multimap::MultiMap;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    conf::NetworkConf,
    pheno::{
        data::{GeneModel, ModelScore},
        scorer::sort_model_scores,
    },
    ppi::matrix::SimilarityMatrix,
};

/// Alias for the best phenotype models of each gene.
pub type GeneModels = MultiMap<u32, ModelScore<GeneModel>>;

/// Closest phenotypically supported gene of a query gene.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneMatch {
    /// The query gene.
    pub query_gene_id: u32,
    /// The closest high-quality gene.
    pub match_gene_id: u32,
    /// Network bias plus weighted similarity.
    pub score: f64,
    /// The best phenotype models of the matched gene.
    pub best_models: Vec<ModelScore<GeneModel>>,
}

impl GeneMatch {
    /// No usable network signal.
    pub const NO_HIT: GeneMatch = GeneMatch {
        query_gene_id: 0,
        match_gene_id: 0,
        score: 0.0,
        best_models: Vec::new(),
    };

    pub fn is_no_hit(&self) -> bool {
        self == &Self::NO_HIT
    }
}

/// Group model scores by gene, each gene's models best first.
pub fn group_best_gene_models(mut scores: Vec<ModelScore<GeneModel>>) -> GeneModels {
    sort_model_scores(&mut scores);
    let mut result = MultiMap::new();
    for score in scores {
        result.insert(score.model.gene_id, score);
    }
    result
}

/// Finds the closest high-quality phenotype hit in the network for a gene.
///
/// Genes whose best model scores above the cutoff are high-quality hits.  Each such gene
/// gets a column of the weighted sub-matrix, its matrix column scaled by its score.
#[derive(Debug)]
pub struct NetworkProximityScorer {
    matrix: Arc<dyn SimilarityMatrix>,
    best_gene_models: GeneModels,
    conf: NetworkConf,
    /// Best score of the high-quality genes, ordered by gene ID.
    high_quality_gene_scores: IndexMap<u32, f64>,
    /// One column per high-quality gene.
    weighted_sub_matrix: Array2<f32>,
}

impl NetworkProximityScorer {
    pub fn new(
        matrix: Arc<dyn SimilarityMatrix>,
        best_gene_models: GeneModels,
        conf: NetworkConf,
    ) -> Self {
        let mut high_quality_gene_scores = best_gene_models
            .iter_all()
            .filter_map(|(gene_id, models)| {
                models
                    .iter()
                    .map(|model| model.score)
                    .reduce(f64::max)
                    .filter(|score| *score > conf.high_quality_cutoff)
                    .map(|score| (*gene_id, score))
            })
            .collect::<IndexMap<_, _>>();
        high_quality_gene_scores.sort_keys();

        let (rows, _) = matrix.dimensions();
        let mut weighted_sub_matrix = Array2::zeros((rows, high_quality_gene_scores.len()));
        for (col, (gene_id, score)) in high_quality_gene_scores.iter().enumerate() {
            match matrix.column_vector_for_gene(*gene_id) {
                Some(column) if column.len() == rows => {
                    weighted_sub_matrix
                        .column_mut(col)
                        .assign(&(column * (*score as f32)));
                }
                Some(column) => tracing::warn!(
                    "column of gene {} has {} values, expected {}",
                    gene_id,
                    column.len(),
                    rows
                ),
                None => (),
            }
        }

        tracing::debug!(
            "{} of {} genes are high-quality phenotype hits (cutoff {})",
            high_quality_gene_scores.len(),
            best_gene_models.keys().count(),
            conf.high_quality_cutoff
        );

        Self {
            matrix,
            best_gene_models,
            conf,
            high_quality_gene_scores,
            weighted_sub_matrix,
        }
    }

    pub fn matrix(&self) -> &dyn SimilarityMatrix {
        self.matrix.as_ref()
    }

    pub fn conf(&self) -> &NetworkConf {
        &self.conf
    }

    pub fn high_quality_gene_scores(&self) -> &IndexMap<u32, f64> {
        &self.high_quality_gene_scores
    }

    pub fn weighted_sub_matrix(&self) -> &Array2<f32> {
        &self.weighted_sub_matrix
    }

    /// Closest high-quality gene of `query_gene_id` other than itself.
    ///
    /// If all weighted values are zero, the first candidate is returned when
    /// `NetworkConf::zero_score_fallback` is set.
    pub fn closest_match(&self, query_gene_id: u32) -> GeneMatch {
        let row = match self.matrix.row_index_for_gene(query_gene_id) {
            Some(row) if !self.high_quality_gene_scores.is_empty() => row,
            _ => return GeneMatch::NO_HIT,
        };

        let mut first_candidate = None;
        let mut best: Option<(usize, f32)> = None;
        for (col, gene_id) in self.high_quality_gene_scores.keys().enumerate() {
            if *gene_id == query_gene_id || !self.matrix.contains_gene(*gene_id) {
                continue;
            }
            first_candidate.get_or_insert(col);
            let value = self.weighted_sub_matrix[[row, col]];
            if value > best.map_or(0.0, |(_, best_value)| best_value) {
                best = Some((col, value));
            }
        }

        let (col, value) = match (best, first_candidate) {
            (Some(best), _) => best,
            (None, Some(col)) if self.conf.zero_score_fallback => {
                (col, self.weighted_sub_matrix[[row, col]])
            }
            _ => return GeneMatch::NO_HIT,
        };
        let Some((match_gene_id, _)) = self.high_quality_gene_scores.get_index(col) else {
            return GeneMatch::NO_HIT;
        };

        GeneMatch {
            query_gene_id,
            match_gene_id: *match_gene_id,
            score: self.conf.walker_bias + value as f64,
            best_models: self
                .best_gene_models
                .get_vec(match_gene_id)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Closest matches of all `query_gene_ids`, in parallel.
    pub fn closest_matches(&self, query_gene_ids: &[u32]) -> Vec<GeneMatch> {
        query_gene_ids
            .par_iter()
            .map(|gene_id| self.closest_match(*gene_id))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        conf::Organism,
        ppi::matrix::{test::symmetric_matrix, EmptyMatrix, InMemoryMatrix},
    };

    const G1: u32 = 2263;
    const G2: u32 = 2260;
    const G3: u32 = 2261;

    fn model_score(id: &str, gene_id: u32, score: f64) -> ModelScore<GeneModel> {
        ModelScore {
            score,
            model: GeneModel {
                id: id.into(),
                organism: Organism::Human,
                gene_id,
                gene_symbol: format!("GENE{}", gene_id),
                phenotype_ids: vec!["HP:0001156".into()],
            },
            best_matches: vec![],
        }
    }

    fn gene_models(scores: &[(&str, u32, f64)]) -> GeneModels {
        group_best_gene_models(
            scores
                .iter()
                .map(|(id, gene_id, score)| model_score(id, *gene_id, *score))
                .collect(),
        )
    }

    fn conf(cutoff: f64) -> NetworkConf {
        NetworkConf {
            high_quality_cutoff: cutoff,
            ..Default::default()
        }
    }

    #[test]
    fn group_best_gene_models_sorted() {
        let models = gene_models(&[("A", G1, 0.3), ("B", G1, 0.9), ("C", G2, 0.1)]);

        assert_eq!(
            models
                .get_vec(&G1)
                .map(|v| v.iter().map(|s| s.model.id.as_str()).collect::<Vec<_>>()),
            Some(vec!["B", "A"])
        );
        assert_eq!(models.get_vec(&G2).map(|v| v.len()), Some(1));
    }

    #[test]
    fn high_quality_genes_above_cutoff() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[
                ("A", G1, 0.9),
                ("B", G1, 0.2),
                ("C", G2, 0.3),
                ("D", G3, 0.5),
            ]),
            conf(0.5),
        );

        assert_eq!(
            scorer.high_quality_gene_scores(),
            &IndexMap::from([(G1, 0.9)])
        );
        assert_eq!(scorer.weighted_sub_matrix().dim(), (3, 1));
        assert!(approx_eq!(
            f32,
            scorer.weighted_sub_matrix()[[1, 0]],
            0.2 * 0.9,
            ulps = 2
        ));
    }

    #[test]
    fn network_scenario() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[
                ("OMIM:1", G1, 0.9),
                ("OMIM:2", G2, 0.3),
                ("OMIM:3", G3, 0.2),
            ]),
            conf(0.5),
        );

        let result = scorer.closest_match(G3);

        assert_eq!(result.query_gene_id, G3);
        assert_eq!(result.match_gene_id, G1);
        assert!(approx_eq!(
            f64,
            result.score,
            0.5 + (0.1f32 * 0.9f32) as f64,
            epsilon = 1e-6
        ));
        assert_eq!(result.best_models, vec![model_score("OMIM:1", G1, 0.9)]);
    }

    #[test]
    fn never_matches_itself() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[("OMIM:1", G1, 0.9), ("OMIM:2", G2, 0.8)]),
            conf(0.5),
        );

        let result = scorer.closest_match(G1);

        assert_eq!(result.match_gene_id, G2);
        assert!(approx_eq!(
            f64,
            result.score,
            0.5 + (0.2f32 * 0.8f32) as f64,
            epsilon = 1e-6
        ));
    }

    #[test]
    fn only_itself_high_quality_is_no_hit() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[("OMIM:1", G1, 0.9)]),
            conf(0.5),
        );

        assert!(scorer.closest_match(G1).is_no_hit());
    }

    #[test]
    fn unknown_gene_is_no_hit() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[("OMIM:1", G1, 0.9)]),
            conf(0.5),
        );

        assert_eq!(scorer.closest_match(1), GeneMatch::NO_HIT);
    }

    #[test]
    fn no_high_quality_genes_is_no_hit() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[("OMIM:1", G1, 0.4), ("OMIM:2", G2, 0.5)]),
            conf(0.5),
        );

        assert!(scorer.high_quality_gene_scores().is_empty());
        assert!(scorer.closest_match(G3).is_no_hit());
    }

    #[test]
    fn empty_matrix_is_no_hit() {
        let scorer = NetworkProximityScorer::new(
            EmptyMatrix::instance(),
            gene_models(&[("OMIM:1", G1, 0.9)]),
            conf(0.5),
        );

        assert_eq!(scorer.weighted_sub_matrix().dim(), (0, 1));
        assert!(scorer.closest_match(G1).is_no_hit());
        assert!(scorer.closest_match(G2).is_no_hit());
    }

    /// Matrix in which gene 3 has no similarity to other genes.
    fn isolated_gene_matrix() -> InMemoryMatrix {
        InMemoryMatrix::new(
            IndexMap::from([(1, 0), (2, 1), (3, 2)]),
            ndarray::array![[1.0, 0.5, 0.0], [0.5, 1.0, 0.0], [0.0, 0.0, 1.0]],
        )
        .expect("valid test matrix")
    }

    #[test]
    fn zero_scores_fall_back_to_first_candidate() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(isolated_gene_matrix()),
            gene_models(&[("A", 1, 0.9), ("B", 2, 0.8)]),
            conf(0.5),
        );

        let result = scorer.closest_match(3);

        assert_eq!(result.match_gene_id, 1);
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn zero_scores_without_fallback_is_no_hit() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(isolated_gene_matrix()),
            gene_models(&[("A", 1, 0.9), ("B", 2, 0.8)]),
            NetworkConf {
                zero_score_fallback: false,
                ..conf(0.5)
            },
        );

        assert!(scorer.closest_match(3).is_no_hit());
        assert!(!scorer.closest_match(1).is_no_hit());
    }

    #[test]
    fn high_quality_gene_missing_from_matrix_is_skipped() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[("A", 7, 0.99), ("B", G1, 0.9)]),
            conf(0.5),
        );

        assert_eq!(scorer.high_quality_gene_scores().len(), 2);
        assert_eq!(scorer.closest_match(G2).match_gene_id, G1);
    }

    #[test]
    fn closest_matches_in_parallel() {
        let scorer = NetworkProximityScorer::new(
            Arc::new(symmetric_matrix()),
            gene_models(&[("OMIM:1", G1, 0.9)]),
            conf(0.5),
        );

        let result = scorer.closest_matches(&[G2, G3, 1]);

        assert_eq!(
            result.iter().map(|m| m.match_gene_id).collect::<Vec<_>>(),
            vec![G1, G1, 0]
        );
    }
}
