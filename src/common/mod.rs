//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    match procfs::process::Process::myself().and_then(|me| me.stat()) {
        Ok(stat) => tracing::debug!(
            "RSS now: {}",
            bytesize::ByteSize::b(stat.rss * procfs::page_size())
        ),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Helper to convert NCBI/Entrez gene IDs as found in input files to `u32`.
///
/// Accepts plain numbers as well as the `NCBIGene:` CURIE prefix.
pub fn numeric_gene_id(raw_id: &str) -> Result<u32, anyhow::Error> {
    let clean_id = raw_id
        .trim()
        .strip_prefix("NCBIGene:")
        .unwrap_or(raw_id.trim());

    clean_id
        .parse::<u32>()
        .map_err(|e| anyhow::anyhow!("could not parse gene id {:?}: {}", &clean_id, &e))
}

/// The version of the `phenoprio` package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Return the version of the `phenoprio` crate and `x.y.z` in tests.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        VERSION
    }
}
