//! Code for scoring models on the command line.

use std::{sync::Arc, time::Instant};

use clap::Parser;
use enum_map::EnumMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    common::{trace_rss_now, worker_version},
    conf::Organism,
    pheno::{
        data::{GeneModel, ModelScore, PhenotypeMatch, PhenotypeTerm},
        index::PhenotypeMatchIndex,
        scorer::{sort_model_scores, OrganismScorers, ScoringMode},
    },
};

/// Command line arguments for `pheno score` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Score models by phenotype similarity", long_about = None)]
pub struct Args {
    /// Path to JSON file with query terms and their matches per organism.
    #[arg(long, required = true)]
    pub path_matches_json: String,
    /// Path to JSON file with the gene models to score.
    #[arg(long, required = true)]
    pub path_models_json: String,
    /// Path to output JSON file, written to stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,

    /// Scoring mode, derived from the organisms with matches if not given.
    #[arg(long, value_enum)]
    pub mode: Option<ScoringMode>,
    /// Use the older raw matching score.
    #[arg(long, default_value_t = false)]
    pub legacy: bool,
    /// Maximal number of models to report.
    #[arg(long)]
    pub max_results: Option<usize>,
}

/// Query terms and the externally computed matches for each organism.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MatchesInput {
    /// The query terms.
    pub query_terms: Vec<PhenotypeTerm>,
    /// Matches of the query terms for each organism.
    #[serde(default)]
    pub organisms: IndexMap<Organism, Vec<PhenotypeMatch>>,
}

/// Result records.
pub mod query_result {
    use serde::{Deserialize, Serialize};

    use crate::pheno::{
        data::{GeneModel, ModelScore, PhenotypeTerm},
        scorer::ScoringMode,
    };

    /// Result container data structure.
    #[derive(Serialize, Deserialize, Debug, Clone)]
    pub struct Container {
        /// Version of the `phenoprio` package.
        pub version: String,
        /// The scoring mode, `None` for automatic selection.
        pub mode: Option<ScoringMode>,
        /// Whether the older raw matching score was used.
        pub legacy: bool,
        /// The query terms.
        pub query: Vec<PhenotypeTerm>,
        /// The scored models, best first.
        pub result: Vec<ModelScore<GeneModel>>,
    }
}

/// Build one index per organism that has matches in `input`.
pub fn build_indexes(
    input: &MatchesInput,
) -> Result<EnumMap<Organism, Option<Arc<PhenotypeMatchIndex>>>, anyhow::Error> {
    let mut result: EnumMap<Organism, Option<Arc<PhenotypeMatchIndex>>> = EnumMap::default();
    for (organism, matches) in &input.organisms {
        let index =
            PhenotypeMatchIndex::from_matches(*organism, &input.query_terms, matches.clone())?;
        result[*organism] = Some(Arc::new(index));
    }
    Ok(result)
}

/// Score `models` against the query and matches in `input`.
pub fn run_query(
    input: &MatchesInput,
    models: &[GeneModel],
    mode: Option<ScoringMode>,
    legacy: bool,
) -> Result<query_result::Container, anyhow::Error> {
    let indexes = build_indexes(input)?;
    let scorers = match mode {
        Some(mode) => OrganismScorers::with_mode(indexes, mode)?,
        None => OrganismScorers::new(indexes)?,
    };

    let result = if legacy {
        let mut result = models
            .iter()
            .filter_map(|model| {
                scorers
                    .get(model.organism)
                    .map(|scorer| scorer.score_legacy(model))
            })
            .collect::<Vec<ModelScore<GeneModel>>>();
        sort_model_scores(&mut result);
        result
    } else {
        scorers.score_gene_models(models)
    };

    Ok(query_result::Container {
        version: worker_version().to_string(),
        mode,
        legacy,
        query: input.query_terms.clone(),
        result,
    })
}

/// Load and deserialize JSON file at `path`.
pub fn load_json<T, P>(path: P) -> Result<T, anyhow::Error>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<std::path::Path>,
{
    let reader = std::fs::File::open(path.as_ref())
        .map(std::io::BufReader::new)
        .map_err(|e| anyhow::anyhow!("could not open {:?}: {}", path.as_ref(), e))?;
    serde_json::from_reader(reader)
        .map_err(|e| anyhow::anyhow!("could not parse {:?}: {}", path.as_ref(), e))
}

/// Main entry point for `pheno score` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    info!("Loading phenotype matches...");
    let before_loading = Instant::now();
    let input: MatchesInput = load_json(&args.path_matches_json)?;
    let models: Vec<GeneModel> = load_json(&args.path_models_json)?;
    info!(
        "... done loading {} query terms and {} models in {:?}",
        input.query_terms.len(),
        models.len(),
        before_loading.elapsed()
    );

    trace_rss_now();

    info!("Starting prioritization...");
    let before_scoring = Instant::now();
    let mut result = run_query(&input, &models, args.mode, args.legacy)?;
    if let Some(max_results) = args.max_results {
        result.result.truncate(max_results);
    }
    info!(
        "... done with prioritization in {:?}",
        before_scoring.elapsed()
    );

    info!(
        "{: >4} | {: <16} | {: <10} | {: >8}",
        "rank", "model", "gene", "score"
    );
    info!("     |                  |            |");
    for (i, record) in result.result.iter().take(10).enumerate() {
        info!(
            "{: >4} | {: <16} | {: <10} | {: >8.4}",
            i + 1,
            record.model.id,
            record.model.gene_symbol,
            record.score
        );
    }

    match &args.path_output {
        Some(path) => {
            let writer = std::fs::File::create(path)
                .map(std::io::BufWriter::new)
                .map_err(|e| anyhow::anyhow!("could not create {:?}: {}", path, e))?;
            serde_json::to_writer_pretty(writer, &result)?;
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use clap_verbosity_flag::Verbosity;
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::*;
    use crate::common::Args as CommonArgs;

    #[test]
    fn run_query_multi_organism() -> Result<(), anyhow::Error> {
        let input: MatchesInput = load_json("tests/data/pheno/matches.json")?;
        let models: Vec<GeneModel> = load_json("tests/data/pheno/models.json")?;

        let result = run_query(&input, &models, None, false)?;

        assert_eq!(result.version, "x.y.z");
        assert_eq!(result.query.len(), 2);
        assert_eq!(
            result
                .result
                .iter()
                .map(|s| s.model.id.as_str())
                .collect::<Vec<_>>(),
            vec!["OMIM:101600", "MGI:95523", "ZFIN:ZDB-GENE-1", "OMIM:000000"]
        );
        assert!(result.result.iter().all(|s| (0.0..=1.0).contains(&s.score)));
        assert_eq!(result.result[3].score, 0.0);

        Ok(())
    }

    #[test]
    fn run_query_legacy() -> Result<(), anyhow::Error> {
        let input: MatchesInput = load_json("tests/data/pheno/matches.json")?;
        let models: Vec<GeneModel> = load_json("tests/data/pheno/models.json")?;

        let result = run_query(&input, &models, None, true)?;

        assert!(result.legacy);
        assert_eq!(result.result.len(), 4);

        Ok(())
    }

    #[test]
    fn smoke_test() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_output = tmp_dir.join("out.json");
        let common_args = CommonArgs {
            verbose: Verbosity::new(1, 0),
        };
        let args = Args {
            path_matches_json: "tests/data/pheno/matches.json".into(),
            path_models_json: "tests/data/pheno/models.json".into(),
            path_output: Some(path_output.to_string_lossy().to_string()),
            mode: Some(ScoringMode::MultiCrossSpecies),
            legacy: false,
            max_results: Some(2),
        };

        run(&common_args, &args)?;

        let result: query_result::Container = load_json(&path_output)?;
        assert_eq!(result.result.len(), 2);
        assert_eq!(result.mode, Some(ScoringMode::MultiCrossSpecies));

        Ok(())
    }
}
