//! The theoretical best model of a query against one organism.

use crate::{
    conf::Organism,
    pheno::{
        data::{PhenotypeMatch, PhenotypeTerm},
        index::PhenotypeMatchIndex,
    },
};

/// Ceiling scores for normalizing model scores.
///
/// This is the model that has the best possible match for each query term.
#[derive(Debug, Clone, PartialEq)]
pub struct TheoreticalReferenceModel {
    organism: Organism,
    query_terms: Vec<PhenotypeTerm>,
    best_matches: Vec<PhenotypeMatch>,
    max_match_score: f64,
    best_avg_score: f64,
}

impl TheoreticalReferenceModel {
    /// Derive from the matches of `index`.
    pub fn new(index: &PhenotypeMatchIndex) -> Self {
        let query_terms = index.query_terms();
        let best_matches = index.best_matches_per_term();

        let max_match_score = best_matches.iter().map(|m| m.score).fold(0f64, f64::max);
        // Dividing by all query terms penalizes organisms with few matched terms.
        let best_avg_score = if best_matches.is_empty() {
            0f64
        } else {
            best_matches.iter().map(|m| m.score).sum::<f64>() / query_terms.len() as f64
        };

        tracing::debug!(
            "theoretical model for {}: max = {}, avg = {} ({} of {} terms matched)",
            index.organism(),
            max_match_score,
            best_avg_score,
            best_matches.len(),
            query_terms.len()
        );

        Self {
            organism: index.organism(),
            query_terms,
            best_matches,
            max_match_score,
            best_avg_score,
        }
    }

    pub fn organism(&self) -> Organism {
        self.organism
    }

    pub fn query_terms(&self) -> &[PhenotypeTerm] {
        &self.query_terms
    }

    pub fn best_matches(&self) -> &[PhenotypeMatch] {
        &self.best_matches
    }

    pub fn max_match_score(&self) -> f64 {
        self.max_match_score
    }

    pub fn best_avg_score(&self) -> f64 {
        self.best_avg_score
    }
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pheno::index::test::{mouse_index, pm, term};

    #[test]
    fn from_mouse_index() {
        let model = TheoreticalReferenceModel::new(&mouse_index());

        assert_eq!(model.organism(), Organism::Mouse);
        assert_eq!(model.query_terms().len(), 3);
        assert_eq!(
            model.best_matches(),
            &[pm("HP:1", "MP:1", 0.8), pm("HP:2", "MP:2", 0.6)]
        );
        assert_eq!(model.max_match_score(), 0.8);
        // divided by all three query terms, also the unmatched one
        assert!(approx_eq!(
            f64,
            model.best_avg_score(),
            (0.8 + 0.6) / 3.0,
            ulps = 2
        ));
    }

    #[test]
    fn max_is_maximum_of_best_matches() {
        let model = TheoreticalReferenceModel::new(&mouse_index());

        assert!(model
            .best_matches()
            .iter()
            .all(|m| m.score <= model.max_match_score()));
        assert!(model
            .best_matches()
            .iter()
            .any(|m| m.score == model.max_match_score()));
    }

    #[test]
    fn no_matches_gives_zero_scores() -> Result<(), anyhow::Error> {
        let index = PhenotypeMatchIndex::from_matches(
            Organism::Fish,
            &[term("HP:1"), term("HP:2")],
            vec![],
        )?;

        let model = TheoreticalReferenceModel::new(&index);

        assert!(model.best_matches().is_empty());
        assert_eq!(model.max_match_score(), 0.0);
        assert_eq!(model.best_avg_score(), 0.0);
        assert!(!model.best_avg_score().is_nan());

        Ok(())
    }
}
