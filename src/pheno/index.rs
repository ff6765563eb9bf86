//! Index of the pre-computed phenotype matches of the query terms against one organism.

use std::collections::{BTreeSet, HashMap};

use indexmap::{IndexMap, IndexSet};

use crate::{
    conf::Organism,
    err::PhenoError,
    pheno::data::{compound_key, PhenotypeMatch, PhenotypeTerm},
};

/// Alias for the query term to candidate matches mapping.
pub type TermMatches = IndexMap<PhenotypeTerm, IndexSet<PhenotypeMatch>>;

/// Best matches of query terms against one organism.
///
/// Iteration follows the insertion order of the query terms and their matches so that
/// tie-breaking among equal scores is reproducible.
#[derive(Debug, Clone)]
pub struct PhenotypeMatchIndex {
    /// The organism whose vocabulary the matches point into.
    organism: Organism,
    /// Candidate matches for each query term, possibly empty.
    term_to_matches: TermMatches,
    /// Ids of organism terms that occur in any match.
    matched_organism_ids: BTreeSet<String>,
    /// Ids of query terms with at least one match.
    matched_query_ids: BTreeSet<String>,
    /// Matches by `query_id + organism_id`.
    compound_index: HashMap<String, PhenotypeMatch>,
}

impl PhenotypeMatchIndex {
    /// Construct from the matches of each query term.
    ///
    /// # Errors
    ///
    /// If `term_to_matches` is empty.
    pub fn new(organism: Organism, term_to_matches: TermMatches) -> Result<Self, PhenoError> {
        if term_to_matches.is_empty() {
            return Err(PhenoError::EmptyQuery(organism.to_string()));
        }

        let mut matched_organism_ids = BTreeSet::new();
        let mut matched_query_ids = BTreeSet::new();
        let mut compound_index = HashMap::new();
        for (term, matches) in &term_to_matches {
            if !matches.is_empty() {
                matched_query_ids.insert(term.id.clone());
            }
            for m in matches {
                matched_organism_ids.insert(m.match_id().to_string());
                // Colliding keys of distinct pairs are overwritten by the later match.
                compound_index.insert(m.compound_key(), m.clone());
            }
        }

        tracing::debug!(
            "indexed {} matches of {} query terms against {}",
            compound_index.len(),
            term_to_matches.len(),
            organism
        );

        Ok(Self {
            organism,
            term_to_matches,
            matched_organism_ids,
            matched_query_ids,
            compound_index,
        })
    }

    /// Construct from query terms and a flat list of matches.
    ///
    /// Matches are grouped under their query term; query terms without matches map to an
    /// empty set and query terms only mentioned in `matches` are appended.
    pub fn from_matches(
        organism: Organism,
        query_terms: &[PhenotypeTerm],
        matches: Vec<PhenotypeMatch>,
    ) -> Result<Self, PhenoError> {
        let mut term_to_matches: TermMatches = query_terms
            .iter()
            .map(|term| (term.clone(), IndexSet::new()))
            .collect();
        for m in matches {
            term_to_matches
                .entry(m.query.clone())
                .or_default()
                .insert(m);
        }
        Self::new(organism, term_to_matches)
    }

    pub fn organism(&self) -> Organism {
        self.organism
    }

    /// The query terms in input order.
    pub fn query_terms(&self) -> Vec<PhenotypeTerm> {
        self.term_to_matches.keys().cloned().collect()
    }

    pub fn query_term_count(&self) -> usize {
        self.term_to_matches.len()
    }

    /// Candidate matches of `term`, `None` if it is no query term.
    pub fn term_matches(&self, term: &PhenotypeTerm) -> Option<&IndexSet<PhenotypeMatch>> {
        self.term_to_matches.get(term)
    }

    /// The highest scoring match for each query term, skipping terms without matches.
    ///
    /// On equal scores, the first match in input order wins.
    pub fn best_matches_per_term(&self) -> Vec<PhenotypeMatch> {
        self.term_to_matches
            .values()
            .filter_map(|matches| first_max_by_score(matches.iter()))
            .cloned()
            .collect()
    }

    pub fn matched_organism_ids(&self) -> &BTreeSet<String> {
        &self.matched_organism_ids
    }

    pub fn matched_query_ids(&self) -> &BTreeSet<String> {
        &self.matched_query_ids
    }

    /// Look up match between query and organism term.
    pub fn lookup(&self, query_id: &str, organism_id: &str) -> Option<&PhenotypeMatch> {
        self.compound_index
            .get(&compound_key(query_id, organism_id))
    }

    /// Number of entries in the compound index.
    pub fn compound_index_len(&self) -> usize {
        self.compound_index.len()
    }

    /// Raw forward and reciprocal best matches of a model's phenotype ids.
    ///
    /// This is the older scoring path.  Different from `ModelSimilarityScorer::score`, the
    /// reciprocal matches also compete for the best match of their query term and matches
    /// with zero score are kept.
    pub fn match_phenotype_ids(&self, model_phenotype_ids: &[String]) -> RawMatchScore {
        let matching_ids = model_phenotype_ids
            .iter()
            .filter(|id| self.matched_organism_ids.contains(id.as_str()))
            .cloned()
            .collect::<Vec<_>>();

        let forward = self.matched_query_ids.iter().filter_map(|hp_id| {
            first_max_by_score(
                matching_ids
                    .iter()
                    .filter_map(|mp_id| self.lookup(hp_id, mp_id)),
            )
        });
        let reciprocal = matching_ids.iter().filter_map(|mp_id| {
            first_max_by_score(
                self.matched_query_ids
                    .iter()
                    .filter_map(|hp_id| self.lookup(hp_id, mp_id)),
            )
        });
        let forward_and_reciprocal = forward.chain(reciprocal).collect::<Vec<_>>();

        let max_score = forward_and_reciprocal
            .iter()
            .map(|m| m.score)
            .fold(0f64, f64::max);
        let sum_scores = forward_and_reciprocal.iter().map(|m| m.score).sum();

        let mut best_by_term: IndexMap<&str, &PhenotypeMatch> = IndexMap::new();
        for m in forward_and_reciprocal.iter().copied() {
            match best_by_term.get(m.query_id()) {
                Some(best) if best.score >= m.score => (),
                _ => {
                    best_by_term.insert(m.query_id(), m);
                }
            }
        }

        RawMatchScore {
            max_score,
            sum_scores,
            matching_phenotype_ids: matching_ids,
            best_matches: best_by_term.into_values().cloned().collect(),
        }
    }
}

/// Unnormalized result of `PhenotypeMatchIndex::match_phenotype_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatchScore {
    /// Maximal score among forward and reciprocal best matches.
    pub max_score: f64,
    /// Sum of the scores of forward and reciprocal best matches.
    pub sum_scores: f64,
    /// Model phenotype ids present in the organism matches, repetitions included.
    pub matching_phenotype_ids: Vec<String>,
    /// Best match per query term.
    pub best_matches: Vec<PhenotypeMatch>,
}

/// Return the first match with the maximal score.
pub(crate) fn first_max_by_score<'a, I>(matches: I) -> Option<&'a PhenotypeMatch>
where
    I: Iterator<Item = &'a PhenotypeMatch>,
{
    matches.fold(None, |best, m| match best {
        Some(best) if best.score >= m.score => Some(best),
        _ => Some(m),
    })
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    pub fn term(id: &str) -> PhenotypeTerm {
        PhenotypeTerm::new(id, format!("label of {}", id))
    }

    pub fn pm(query_id: &str, match_id: &str, score: f64) -> PhenotypeMatch {
        PhenotypeMatch::new(term(query_id), term(match_id), score)
    }

    /// Index with three query terms, `HP:3` has no match.
    pub fn mouse_index() -> PhenotypeMatchIndex {
        PhenotypeMatchIndex::from_matches(
            Organism::Mouse,
            &[term("HP:1"), term("HP:2"), term("HP:3")],
            vec![
                pm("HP:1", "MP:1", 0.8),
                pm("HP:1", "MP:2", 0.3),
                pm("HP:2", "MP:2", 0.6),
                pm("HP:2", "MP:3", 0.4),
            ],
        )
        .expect("valid test input")
    }

    #[test]
    fn empty_query_rejected() {
        let res = PhenotypeMatchIndex::new(Organism::Fish, TermMatches::new());

        assert_eq!(res.unwrap_err(), PhenoError::EmptyQuery("fish".into()));
    }

    #[test]
    fn derived_ids_sorted() {
        let index = mouse_index();

        assert_eq!(
            index.matched_organism_ids().iter().collect::<Vec<_>>(),
            vec!["MP:1", "MP:2", "MP:3"]
        );
        assert_eq!(
            index.matched_query_ids().iter().collect::<Vec<_>>(),
            vec!["HP:1", "HP:2"]
        );
        assert_eq!(index.query_term_count(), 3);
        assert_eq!(index.compound_index_len(), 4);
    }

    #[test]
    fn term_without_match_has_empty_set() {
        let index = mouse_index();

        assert_eq!(index.term_matches(&term("HP:3")).map(|m| m.len()), Some(0));
        assert_eq!(index.term_matches(&term("HP:4")), None);
    }

    #[rstest::rstest]
    #[case("HP:1", "MP:1", Some(0.8))]
    #[case("HP:1", "MP:2", Some(0.3))]
    #[case("HP:2", "MP:1", None)]
    #[case("HP:3", "MP:3", None)]
    fn lookup(#[case] query_id: &str, #[case] organism_id: &str, #[case] expected: Option<f64>) {
        let index = mouse_index();

        assert_eq!(
            index.lookup(query_id, organism_id).map(|m| m.score),
            expected
        );
    }

    #[test]
    fn best_matches_per_term() {
        let index = mouse_index();

        assert_eq!(
            index.best_matches_per_term(),
            vec![pm("HP:1", "MP:1", 0.8), pm("HP:2", "MP:2", 0.6)]
        );
    }

    #[test]
    fn best_match_tie_keeps_first() {
        let index = PhenotypeMatchIndex::from_matches(
            Organism::Human,
            &[term("HP:1")],
            vec![pm("HP:1", "HP:9", 0.5), pm("HP:1", "HP:8", 0.5)],
        )
        .expect("valid test input");

        assert_eq!(index.best_matches_per_term(), vec![pm("HP:1", "HP:9", 0.5)]);
    }

    #[test]
    fn compound_key_collision_overwrites() {
        // "AB" + "C" and "A" + "BC" share the key "ABC", the later match is kept.
        let index = PhenotypeMatchIndex::from_matches(
            Organism::Human,
            &[term("AB"), term("A")],
            vec![pm("AB", "C", 0.1), pm("A", "BC", 0.9)],
        )
        .expect("valid test input");

        assert_eq!(index.compound_index_len(), 1);
        assert_eq!(index.lookup("AB", "C").map(|m| m.score), Some(0.9));
        assert_eq!(index.lookup("A", "BC").map(|m| m.score), Some(0.9));
    }

    #[test]
    fn match_phenotype_ids_forward_and_reciprocal() {
        let index = mouse_index();

        let raw = index.match_phenotype_ids(&["MP:2".to_string(), "MP:99".to_string()]);

        // forward: HP:1 -> MP:2 (0.3), HP:2 -> MP:2 (0.6); reciprocal: MP:2 -> HP:2 (0.6)
        assert_eq!(raw.max_score, 0.6);
        assert_eq!(raw.sum_scores, 0.3 + 0.6 + 0.6);
        assert_eq!(raw.matching_phenotype_ids, vec!["MP:2".to_string()]);
        assert_eq!(
            raw.best_matches,
            vec![pm("HP:1", "MP:2", 0.3), pm("HP:2", "MP:2", 0.6)]
        );
    }

    #[test]
    fn match_phenotype_ids_keeps_duplicates() {
        let index = mouse_index();

        let raw = index.match_phenotype_ids(&["MP:2".to_string(), "MP:2".to_string()]);

        assert_eq!(raw.sum_scores, 0.3 + 0.6 + 0.6 + 0.6);
        assert_eq!(
            raw.matching_phenotype_ids,
            vec!["MP:2".to_string(), "MP:2".to_string()]
        );
    }

    #[test]
    fn match_phenotype_ids_no_overlap() {
        let index = mouse_index();

        let raw = index.match_phenotype_ids(&["MP:99".to_string()]);

        assert_eq!(raw.max_score, 0.0);
        assert_eq!(raw.sum_scores, 0.0);
        assert!(raw.matching_phenotype_ids.is_empty());
        assert!(raw.best_matches.is_empty());
    }
}
