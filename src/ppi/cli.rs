//! Command line interface for converting matrices and querying the network.

use std::{sync::Arc, time::Instant};

use clap::Parser;
use tracing::info;

use crate::{
    common::{numeric_gene_id, trace_rss_now},
    conf::NetworkConf,
    pheno::cli::{load_json, query_result},
    ppi::{
        loader::{load_in_memory, write_legacy_text, write_rocksdb},
        matrix::{EmptyMatrix, SimilarityMatrix},
        rocks::DiskBackedMatrix,
        scorer::{group_best_gene_models, GeneMatch, NetworkProximityScorer},
    },
};

/// Where to read a similarity matrix from.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct MatrixSource {
    /// Path to the legacy (gzip compressed) gene index file.
    #[arg(long, requires = "path_matrix", conflicts_with = "path_rocksdb")]
    pub path_index: Option<String>,
    /// Path to the legacy (gzip compressed) matrix file.
    #[arg(long, requires = "path_index")]
    pub path_matrix: Option<String>,
    /// Exponentiate values of the legacy matrix file on load.
    #[arg(long, default_value_t = false)]
    pub exponentiate: bool,
    /// Path to the RocksDB matrix store.
    #[arg(long)]
    pub path_rocksdb: Option<String>,
}

impl MatrixSource {
    /// Open the matrix, the empty matrix if no source is given.
    pub fn open(&self) -> Result<Arc<dyn SimilarityMatrix>, anyhow::Error> {
        let matrix: Arc<dyn SimilarityMatrix> =
            match (&self.path_index, &self.path_matrix, &self.path_rocksdb) {
                (Some(path_index), Some(path_matrix), _) => {
                    Arc::new(load_in_memory(path_index, path_matrix, self.exponentiate)?)
                }
                (_, _, Some(path_rocksdb)) => Arc::new(DiskBackedMatrix::open(path_rocksdb)?),
                _ => {
                    tracing::warn!("no network data given, using empty matrix");
                    EmptyMatrix::instance()
                }
            };
        Ok(matrix)
    }
}

/// Command line arguments for `ppi convert` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert similarity matrix representations", long_about = None)]
pub struct ConvertArgs {
    /// The matrix to convert.
    #[command(flatten)]
    pub source: MatrixSource,

    /// Path to output RocksDB.
    #[arg(long)]
    pub path_out_rocksdb: Option<String>,
    /// Path to output legacy gene index file.
    #[arg(long, requires = "path_out_matrix")]
    pub path_out_index: Option<String>,
    /// Path to output legacy matrix file.
    #[arg(long, requires = "path_out_index")]
    pub path_out_matrix: Option<String>,
}

/// Main entry point for `ppi convert` sub command.
pub fn run_convert(
    args_common: &crate::common::Args,
    args: &ConvertArgs,
) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    if args.path_out_rocksdb.is_none() && args.path_out_index.is_none() {
        anyhow::bail!("no output given, specify --path-out-rocksdb or --path-out-index");
    }
    if args.source.path_index.is_none() && args.source.path_rocksdb.is_none() {
        anyhow::bail!("no input given, specify --path-index or --path-rocksdb");
    }

    let before_converting = Instant::now();
    let matrix = args.source.open()?;
    trace_rss_now();

    if let Some(path_out_rocksdb) = &args.path_out_rocksdb {
        write_rocksdb(matrix.as_ref(), path_out_rocksdb)?;
    }
    if let (Some(path_out_index), Some(path_out_matrix)) =
        (&args.path_out_index, &args.path_out_matrix)
    {
        write_legacy_text(matrix.as_ref(), path_out_index, path_out_matrix)?;
    }
    info!("... done converting in {:?}", before_converting.elapsed());

    Ok(())
}

/// Command line arguments for `ppi closest` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Find closest phenotype hits in the network", long_about = None)]
pub struct ClosestArgs {
    /// The network matrix, empty if not given.
    #[command(flatten)]
    pub source: MatrixSource,

    /// Path to JSON output of `pheno score`.
    #[arg(long, required = true)]
    pub path_scores_json: String,
    /// Optional path to JSON file with network settings.
    #[arg(long)]
    pub path_conf: Option<String>,
    /// Override the high-quality phenotype score cutoff.
    #[arg(long)]
    pub high_quality_cutoff: Option<f64>,
    /// The genes to find the closest hits for, NCBI gene IDs.
    #[arg(long, required = true, value_delimiter = ',')]
    pub gene_ids: Vec<String>,
    /// Path to output JSON file, written to stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// Find the closest network matches of `gene_ids` using the scores in `scores`.
pub fn run_closest_query(
    matrix: Arc<dyn SimilarityMatrix>,
    scores: query_result::Container,
    conf: NetworkConf,
    gene_ids: &[u32],
) -> Vec<GeneMatch> {
    let scorer = NetworkProximityScorer::new(matrix, group_best_gene_models(scores.result), conf);
    scorer.closest_matches(gene_ids)
}

/// Main entry point for `ppi closest` sub command.
pub fn run_closest(
    args_common: &crate::common::Args,
    args: &ClosestArgs,
) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    let mut conf = match &args.path_conf {
        Some(path) => NetworkConf::from_json_path(path)?,
        None => NetworkConf::default(),
    };
    if let Some(cutoff) = args.high_quality_cutoff {
        conf.high_quality_cutoff = cutoff;
    }
    let gene_ids = args
        .gene_ids
        .iter()
        .map(|gene_id| numeric_gene_id(gene_id))
        .collect::<Result<Vec<_>, _>>()?;

    let matrix = args.source.open()?;
    let scores: query_result::Container = load_json(&args.path_scores_json)?;
    trace_rss_now();

    info!("Finding closest genes...");
    let before_query = Instant::now();
    let result = run_closest_query(matrix, scores, conf, &gene_ids);
    info!("... done in {:?}", before_query.elapsed());

    for gene_match in &result {
        info!(
            "{: >10} -> {: >10} | {: >8.4}",
            gene_match.query_gene_id, gene_match.match_gene_id, gene_match.score
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
