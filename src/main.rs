//! Phenotype similarity scoring and network based gene prioritization.

pub mod common;
pub mod conf;
pub mod err;
pub mod pheno;
pub mod ppi;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Phenotype driven gene prioritization",
    long_about = "This tool scores gene models by phenotype similarity and finds their \
    closest hits in a protein interaction network"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Phenotype similarity commands.
    Pheno(Pheno),
    /// Protein interaction network commands.
    Ppi(Ppi),
}

/// Parsing of "pheno *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Pheno {
    /// The sub command to run
    #[command(subcommand)]
    command: PhenoCommands,
}

/// Enum supporting the parsing of "pheno *" sub commands.
#[derive(Debug, Subcommand)]
enum PhenoCommands {
    Score(pheno::cli::Args),
}

/// Parsing of "ppi *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Ppi {
    /// The sub command to run
    #[command(subcommand)]
    command: PpiCommands,
}

/// Enum supporting the parsing of "ppi *" sub commands.
#[derive(Debug, Subcommand)]
enum PpiCommands {
    Convert(ppi::cli::ConvertArgs),
    Closest(ppi::cli::ClosestArgs),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Pheno(pheno) => match &pheno.command {
                PhenoCommands::Score(args) => pheno::cli::run(&cli.common, args)?,
            },
            Commands::Ppi(ppi) => match &ppi.command {
                PpiCommands::Convert(args) => ppi::cli::run_convert(&cli.common, args)?,
                PpiCommands::Closest(args) => ppi::cli::run_closest(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
