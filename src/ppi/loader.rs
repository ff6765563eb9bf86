//! Loading and conversion of the similarity matrix representations.
//!
//! The legacy text representation consists of two (gzip compressed) tab-separated files,
//! an index file with lines `<gene ID>\t<row index>` and a matrix file with one line per
//! row.

use std::{io::Write, path::Path, time::Instant};

use indexmap::IndexMap;
use indicatif::ProgressIterator;
use itertools::Itertools;
use ndarray::Array2;
use serde::Deserialize;
use tracing::info;

use crate::{
    common::{io::open_read_maybe_gz, io::open_write_maybe_gz, worker_version},
    err::MatrixError,
    ppi::{
        matrix::{InMemoryMatrix, SimilarityMatrix},
        rocks::{
            encode_column, encode_gene_id, encode_row_index, CF_GENE_COLUMN, CF_GENE_ROW_INDEX,
            CF_META, CF_NAMES, META_BUILDER_VERSION, META_DIMENSION,
        },
    },
};

/// Record of the index file.
#[derive(Debug, Deserialize)]
struct IndexRecord {
    gene_id: u32,
    row: usize,
}

/// Load the gene ID to row index mapping from the index file.
pub fn load_gene_index<P: AsRef<Path>>(path: P) -> Result<IndexMap<u32, usize>, anyhow::Error> {
    info!("  loading gene index from {:?}", path.as_ref());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_reader(open_read_maybe_gz(path.as_ref())?);

    let mut result = IndexMap::new();
    for record in reader.deserialize::<IndexRecord>() {
        let record = record?;
        if let Some(previous) = result.insert(record.gene_id, record.row) {
            tracing::warn!(
                "gene {} listed twice, row {} replaced by {}",
                record.gene_id,
                previous,
                record.row
            );
        }
    }

    Ok(result)
}

/// Load the matrix file, each line must have `num_cols` values.
///
/// With `exponentiate`, each value `x` is replaced by `exp(x)`.
pub fn load_matrix_rows<P: AsRef<Path>>(
    path: P,
    num_cols: usize,
    exponentiate: bool,
) -> Result<Array2<f32>, anyhow::Error> {
    info!("  loading matrix rows from {:?}", path.as_ref());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(open_read_maybe_gz(path.as_ref())?);

    let mut values = Vec::new();
    let mut num_rows = 0;
    for record in reader.records() {
        let record = record?;
        if record.len() != num_cols {
            return Err(MatrixError::RowLengthMismatch {
                row: num_rows,
                len: record.len(),
                expected: num_cols,
            }
            .into());
        }
        for field in record.iter() {
            let value = field.trim().parse::<f32>().map_err(|e| {
                anyhow::anyhow!("invalid value {:?} in row {}: {}", field, num_rows, e)
            })?;
            values.push(if exponentiate { value.exp() } else { value });
        }
        num_rows += 1;
    }

    Ok(Array2::from_shape_vec((num_rows, num_cols), values)?)
}

/// Load in-memory matrix from the legacy text files.
pub fn load_in_memory<P: AsRef<Path>, Q: AsRef<Path>>(
    path_index: P,
    path_matrix: Q,
    exponentiate: bool,
) -> Result<InMemoryMatrix, anyhow::Error> {
    info!("Loading similarity matrix...");
    let before_loading = Instant::now();
    let gene_rows = load_gene_index(path_index)?;
    let matrix = load_matrix_rows(path_matrix, gene_rows.len(), exponentiate)?;
    let result = InMemoryMatrix::new(gene_rows, matrix)?;
    info!(
        "... done loading {:?} matrix in {:?}",
        result.dimensions(),
        before_loading.elapsed()
    );
    Ok(result)
}

/// Copy any matrix into memory, e.g., to leave the disk-backed representation.
pub fn to_in_memory<M: SimilarityMatrix + ?Sized>(
    matrix: &M,
) -> Result<InMemoryMatrix, MatrixError> {
    InMemoryMatrix::new(
        matrix.gene_row_indexes().clone(),
        matrix.full_matrix()?.clone(),
    )
}

/// Write matrix to the legacy text files, gzip compressed for `.gz` paths.
pub fn write_legacy_text<M: SimilarityMatrix + ?Sized, P: AsRef<Path>, Q: AsRef<Path>>(
    matrix: &M,
    path_index: P,
    path_matrix: Q,
) -> Result<(), anyhow::Error> {
    info!(
        "Writing matrix to {:?} and {:?}",
        path_index.as_ref(),
        path_matrix.as_ref()
    );
    let mut writer = open_write_maybe_gz(path_index)?;
    for (gene_id, row) in matrix
        .gene_row_indexes()
        .iter()
        .sorted_by_key(|(_, row)| **row)
    {
        writeln!(writer, "{}\t{}", gene_id, row)?;
    }
    writer.flush()?;

    let mut writer = open_write_maybe_gz(path_matrix)?;
    for row in matrix.full_matrix()?.rows() {
        writeln!(writer, "{}", row.iter().join("\t"))?;
    }
    writer.flush()?;

    Ok(())
}

/// Construct tuned RocksDB options.
fn build_rocksdb_options() -> rocksdb::Options {
    let mut options = rocksdb::Options::default();

    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.prepare_for_bulk_load();
    options.set_disable_auto_compactions(true);

    // Compress all files with zstd.
    options.set_compression_per_level(&[]);
    options.set_compression_type(rocksdb::DBCompressionType::Zstd);
    options.set_compression_options(-14, 2, 0, 0);

    options
}

/// Construct the `indicatif` style for progress bars.
pub fn indicatif_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {human_pos}/{human_len} ({eta})",
    )
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
    .progress_chars("#>-")
}

/// Write matrix into a RocksDB store at `path` for disk-backed access.
pub fn write_rocksdb<M: SimilarityMatrix + ?Sized, P: AsRef<Path>>(
    matrix: &M,
    path: P,
) -> Result<(), anyhow::Error> {
    info!("Writing matrix store to {:?}...", path.as_ref());
    let before_writing = Instant::now();

    let options = build_rocksdb_options();
    let db = rocksdb::DB::open_cf(&options, path.as_ref(), CF_NAMES)?;

    let cf_meta = db
        .cf_handle(CF_META)
        .ok_or_else(|| MatrixError::MissingColumnFamily(CF_META.to_string()))?;
    let cf_index = db
        .cf_handle(CF_GENE_ROW_INDEX)
        .ok_or_else(|| MatrixError::MissingColumnFamily(CF_GENE_ROW_INDEX.to_string()))?;
    let cf_column = db
        .cf_handle(CF_GENE_COLUMN)
        .ok_or_else(|| MatrixError::MissingColumnFamily(CF_GENE_COLUMN.to_string()))?;

    tracing::info!("  writing meta data to database");
    let (rows, _) = matrix.dimensions();
    db.put_cf(&cf_meta, META_BUILDER_VERSION, worker_version())?;
    db.put_cf(&cf_meta, META_DIMENSION, rows.to_string())?;

    tracing::info!("  writing gene index and columns to database");
    for (gene_id, row) in matrix
        .gene_row_indexes()
        .iter()
        .progress_with_style(indicatif_style())
    {
        let column = matrix
            .column_vector_for_gene(*gene_id)
            .ok_or_else(|| MatrixError::InvalidStoreValue(gene_id.to_string()))?;
        let key = encode_gene_id(*gene_id);
        db.put_cf(&cf_index, key, encode_row_index(*row)?)?;
        db.put_cf(&cf_column, key, encode_column(&column.to_vec()))?;
    }

    tracing::info!("  enforce manual compaction");
    for cf in [&cf_meta, &cf_index, &cf_column] {
        db.compact_range_cf(cf, None::<&[u8]>, None::<&[u8]>);
    }
    let compaction_start = Instant::now();
    let mut last_printed = compaction_start;
    while db
        .property_int_value(rocksdb::properties::COMPACTION_PENDING)?
        .unwrap_or_default()
        > 0
        || db
            .property_int_value(rocksdb::properties::NUM_RUNNING_COMPACTIONS)?
            .unwrap_or_default()
            > 0
    {
        std::thread::sleep(std::time::Duration::from_millis(100));
        if last_printed.elapsed() > std::time::Duration::from_millis(1000) {
            tracing::info!(
                "  ... waiting for compaction for {:?}",
                compaction_start.elapsed()
            );
            last_printed = Instant::now();
        }
    }

    info!(
        "... done writing {} genes in {:?}",
        rows,
        before_writing.elapsed()
    );

    Ok(())
}
