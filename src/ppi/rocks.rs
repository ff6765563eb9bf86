//! Similarity matrix backed by a RocksDB store.

use std::{path::Path, time::Instant};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use once_cell::sync::OnceCell;

use crate::{
    err::MatrixError,
    ppi::matrix::{check_row_indexes, row_genes, SimilarityMatrix},
};

/// Column family with meta data.
pub const CF_META: &str = "meta";
/// Column family with gene ID to row index mapping.
pub const CF_GENE_ROW_INDEX: &str = "gene_row_index";
/// Column family with gene ID to column vector mapping.
pub const CF_GENE_COLUMN: &str = "gene_column";
/// All column families of the matrix store.
pub const CF_NAMES: &[&str] = &[CF_META, CF_GENE_ROW_INDEX, CF_GENE_COLUMN];

/// Meta data key for the matrix dimension.
pub const META_DIMENSION: &str = "dimension";
/// Meta data key for the version of the writer.
pub const META_BUILDER_VERSION: &str = "builder-version";

/// Number of stored columns checked when opening.
pub const COLUMN_CHECK_SAMPLE_SIZE: usize = 16;

/// Encode gene ID as store key.
pub fn encode_gene_id(gene_id: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, gene_id);
    buf
}

/// Decode gene ID from store key.
pub fn decode_gene_id(buf: &[u8]) -> Result<u32, MatrixError> {
    if buf.len() != 4 {
        return Err(MatrixError::InvalidStoreValue(format!("{:x?}", buf)));
    }
    Ok(BigEndian::read_u32(buf))
}

/// Encode row index as store value.
pub fn encode_row_index(row: usize) -> Result<[u8; 4], MatrixError> {
    let row = u32::try_from(row).map_err(|_| MatrixError::InvalidStoreValue(row.to_string()))?;
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, row);
    Ok(buf)
}

/// Decode row index from store value.
pub fn decode_row_index(buf: &[u8]) -> Result<usize, MatrixError> {
    if buf.len() != 4 {
        return Err(MatrixError::InvalidStoreValue(format!("{:x?}", buf)));
    }
    Ok(LittleEndian::read_u32(buf) as usize)
}

/// Encode column vector as store value.
pub fn encode_column(column: &[f32]) -> Vec<u8> {
    let mut buf = vec![0u8; column.len() * 4];
    LittleEndian::write_f32_into(column, &mut buf);
    buf
}

/// Decode column vector from store value.
pub fn decode_column(buf: &[u8]) -> Result<Vec<f32>, MatrixError> {
    if buf.len() % 4 != 0 {
        return Err(MatrixError::InvalidStoreValue(format!(
            "column of {} bytes",
            buf.len()
        )));
    }
    let mut column = vec![0f32; buf.len() / 4];
    LittleEndian::read_f32_into(buf, &mut column);
    Ok(column)
}

/// Similarity matrix reading columns from a read-only RocksDB.
///
/// The gene index is loaded when opening, columns are read on demand.  The full matrix is
/// only assembled on first request and kept afterwards.
pub struct DiskBackedMatrix {
    db: rocksdb::DB,
    gene_rows: IndexMap<u32, usize>,
    row_genes: Vec<Option<u32>>,
    dimension: usize,
    full_matrix: OnceCell<Array2<f32>>,
}

impl std::fmt::Debug for DiskBackedMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskBackedMatrix")
            .field("path", &self.db.path())
            .field("dimension", &self.dimension)
            .field("full_matrix_loaded", &self.full_matrix.get().is_some())
            .finish()
    }
}

impl DiskBackedMatrix {
    /// Open the store at `path` read-only and load its gene index.
    ///
    /// # Errors
    ///
    /// If the store is missing, lacks a column family, the index is inconsistent with the
    /// stored dimension, or one of the first `COLUMN_CHECK_SAMPLE_SIZE` columns does not
    /// decode to `dimension` values.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        tracing::info!("Opening matrix store {:?}...", path.as_ref());
        let before_opening = Instant::now();
        let db = rocksdb::DB::open_cf_for_read_only(
            &rocksdb::Options::default(),
            path.as_ref(),
            CF_NAMES,
            false,
        )
        .map_err(|e| anyhow::anyhow!("could not open matrix store {:?}: {}", path.as_ref(), e))?;

        let cf_meta = db
            .cf_handle(CF_META)
            .ok_or_else(|| MatrixError::MissingColumnFamily(CF_META.to_string()))?;
        let dimension = db
            .get_cf(&cf_meta, META_DIMENSION)?
            .ok_or_else(|| MatrixError::InvalidStoreValue(META_DIMENSION.to_string()))?;
        let dimension = std::str::from_utf8(&dimension)?.parse::<usize>()?;

        let cf_index = db
            .cf_handle(CF_GENE_ROW_INDEX)
            .ok_or_else(|| MatrixError::MissingColumnFamily(CF_GENE_ROW_INDEX.to_string()))?;
        let mut entries = Vec::with_capacity(dimension);
        for item in db.iterator_cf(&cf_index, rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            entries.push((decode_gene_id(&key)?, decode_row_index(&value)?));
        }
        entries.sort_by_key(|(_, row)| *row);
        let gene_rows: IndexMap<u32, usize> = entries.into_iter().collect();

        if gene_rows.len() != dimension {
            return Err(MatrixError::RowCountMismatch {
                rows: dimension,
                index_size: gene_rows.len(),
            }
            .into());
        }
        check_row_indexes(&gene_rows, dimension)?;

        let cf_column = db
            .cf_handle(CF_GENE_COLUMN)
            .ok_or_else(|| MatrixError::MissingColumnFamily(CF_GENE_COLUMN.to_string()))?;
        for item in db
            .iterator_cf(&cf_column, rocksdb::IteratorMode::Start)
            .take(COLUMN_CHECK_SAMPLE_SIZE)
        {
            let (key, value) = item?;
            let gene_id = decode_gene_id(&key)?;
            let row = gene_rows
                .get(&gene_id)
                .copied()
                .ok_or_else(|| MatrixError::InvalidStoreValue(gene_id.to_string()))?;
            let len = decode_column(&value)?.len();
            if len != dimension {
                return Err(MatrixError::RowLengthMismatch {
                    row,
                    len,
                    expected: dimension,
                }
                .into());
            }
        }

        drop(cf_meta);
        drop(cf_index);
        drop(cf_column);
        tracing::info!(
            "... done opening matrix store with {} genes in {:?}",
            dimension,
            before_opening.elapsed()
        );

        Ok(Self {
            row_genes: row_genes(&gene_rows, dimension),
            db,
            gene_rows,
            dimension,
            full_matrix: OnceCell::new(),
        })
    }

    /// Read column of `gene_id` from the store.
    fn read_column(&self, gene_id: u32) -> Result<Option<Vec<f32>>, MatrixError> {
        let cf_column = self
            .db
            .cf_handle(CF_GENE_COLUMN)
            .ok_or_else(|| MatrixError::MissingColumnFamily(CF_GENE_COLUMN.to_string()))?;
        let value = self
            .db
            .get_cf(&cf_column, encode_gene_id(gene_id))
            .map_err(|e| MatrixError::Store(e.to_string()))?;
        value.map(|buf| decode_column(&buf)).transpose()
    }

    /// Assemble the full matrix from the stored columns.
    fn load_full_matrix(&self) -> Result<Array2<f32>, MatrixError> {
        tracing::debug!(
            "assembling full {}x{} matrix",
            self.dimension,
            self.dimension
        );
        let before_loading = Instant::now();
        let mut result = Array2::zeros((self.dimension, self.dimension));
        for (gene_id, row) in &self.gene_rows {
            let column = self
                .read_column(*gene_id)?
                .ok_or_else(|| MatrixError::InvalidStoreValue(gene_id.to_string()))?;
            if column.len() != self.dimension {
                return Err(MatrixError::RowLengthMismatch {
                    row: *row,
                    len: column.len(),
                    expected: self.dimension,
                });
            }
            result.row_mut(*row).assign(&Array1::from(column));
        }
        tracing::debug!("... done assembling in {:?}", before_loading.elapsed());
        Ok(result)
    }

    /// Close the underlying store.
    pub fn close(self) {
        tracing::debug!("closing matrix store {:?}", self.db.path());
    }
}

impl SimilarityMatrix for DiskBackedMatrix {
    fn row_index_for_gene(&self, gene_id: u32) -> Option<usize> {
        self.gene_rows.get(&gene_id).copied()
    }

    fn gene_id_at_row(&self, row: usize) -> Option<u32> {
        self.row_genes.get(row).copied().flatten()
    }

    fn column_vector_for_gene(&self, gene_id: u32) -> Option<Array1<f32>> {
        if !self.gene_rows.contains_key(&gene_id) {
            return None;
        }
        match self.read_column(gene_id) {
            Ok(column) => column.map(Array1::from),
            Err(e) => {
                tracing::warn!("could not read column of gene {}: {}", gene_id, e);
                None
            }
        }
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.dimension, self.dimension)
    }

    fn gene_row_indexes(&self) -> &IndexMap<u32, usize> {
        &self.gene_rows
    }

    fn full_matrix(&self) -> Result<&Array2<f32>, MatrixError> {
        self.full_matrix.get_or_try_init(|| self.load_full_matrix())
    }
}
