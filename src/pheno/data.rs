//! Data structures shared by phenotype matching and scoring.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::conf::Organism;

/// An ontology term, e.g., `HP:0001156` ("Brachydactyly").
///
/// Equality, ordering and hashing only consider the identifier.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PhenotypeTerm {
    /// The term identifier.
    pub id: String,
    /// The term's display label.
    #[serde(default)]
    pub label: String,
}

impl PhenotypeTerm {
    pub fn new<I: Into<String>, L: Into<String>>(id: I, label: L) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl PartialEq for PhenotypeTerm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PhenotypeTerm {}

impl Hash for PhenotypeTerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for PhenotypeTerm {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhenotypeTerm {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

/// Pre-computed semantic similarity between a query term and an organism term.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PhenotypeMatch {
    /// The query (patient) term.
    pub query: PhenotypeTerm,
    /// The term of the organism's vocabulary.
    #[serde(rename = "match")]
    pub matched: PhenotypeTerm,
    /// The similarity score.
    pub score: f64,
}

impl PhenotypeMatch {
    pub fn new(query: PhenotypeTerm, matched: PhenotypeTerm, score: f64) -> Self {
        Self {
            query,
            matched,
            score,
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query.id
    }

    pub fn match_id(&self) -> &str {
        &self.matched.id
    }

    /// Key of the match in the compound index, the concatenation of query and match id.
    pub fn compound_key(&self) -> String {
        compound_key(self.query_id(), self.match_id())
    }
}

/// Build compound index key from query and organism term id.
///
/// Note that distinct pairs may collide, e.g., `"AB" + "C"` and `"A" + "BC"`.
pub fn compound_key(query_id: &str, match_id: &str) -> String {
    let mut key = String::with_capacity(query_id.len() + match_id.len());
    key.push_str(query_id);
    key.push_str(match_id);
    key
}

impl PartialEq for PhenotypeMatch {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query
            && self.matched == other.matched
            && self.score.to_bits() == other.score.to_bits()
    }
}

impl Eq for PhenotypeMatch {}

impl Hash for PhenotypeMatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
        self.matched.hash(state);
        self.score.to_bits().hash(state);
    }
}

/// A disease or gene model described by terms of one organism's vocabulary.
pub trait Model {
    /// Identifier of the model.
    fn id(&self) -> &str;
    /// Identifiers of the model's phenotype terms.
    fn phenotype_ids(&self) -> &[String];
}

/// Gene model, the phenotypes associated with a gene (or its ortholog) in one organism.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GeneModel {
    /// Model identifier, e.g., `OMIM:101600` or `MGI:95523`.
    pub id: String,
    /// The organism whose vocabulary is used.
    #[serde(default)]
    pub organism: Organism,
    /// NCBI/Entrez ID of the human gene.
    pub gene_id: u32,
    /// Symbol of the human gene.
    pub gene_symbol: String,
    /// The associated phenotype term ids.
    pub phenotype_ids: Vec<String>,
}

impl Model for GeneModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn phenotype_ids(&self) -> &[String] {
        &self.phenotype_ids
    }
}

/// Result of scoring one model against the query terms.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelScore<M> {
    /// Normalized score in `[0, 1]`.
    pub score: f64,
    /// The scored model.
    pub model: M,
    /// Best match for each query term that matched any of the model's terms.
    pub best_matches: Vec<PhenotypeMatch>,
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn phenotype_term_equality_by_id() {
        let a = PhenotypeTerm::new("HP:0001156", "Brachydactyly");
        let b = PhenotypeTerm::new("HP:0001156", "");

        assert_eq!(a, b);
        assert_eq!(HashSet::from([a, b]).len(), 1);
    }

    #[test]
    fn phenotype_match_compound_key() {
        let m = PhenotypeMatch::new(
            PhenotypeTerm::new("HP:0001156", "Brachydactyly"),
            PhenotypeTerm::new("MP:0002544", "brachydactyly"),
            2.5,
        );

        assert_eq!(m.compound_key(), "HP:0001156MP:0002544");
    }

    #[test]
    fn compound_key_collides_for_shifted_boundaries() {
        assert_eq!(compound_key("AB", "C"), compound_key("A", "BC"));
    }

    #[test]
    fn phenotype_match_json() -> Result<(), anyhow::Error> {
        let m: PhenotypeMatch = serde_json::from_str(
            r#"{"query": {"id": "HP:1"}, "match": {"id": "MP:1", "label": "x"}, "score": 0.5}"#,
        )?;

        assert_eq!(m.query_id(), "HP:1");
        assert_eq!(m.match_id(), "MP:1");
        assert_eq!(m.score, 0.5);

        Ok(())
    }
}
