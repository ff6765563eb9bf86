//! Gene-indexed similarity matrices of the protein interaction network.

use std::sync::Arc;

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;

use crate::err::MatrixError;

/// Access to a symmetric gene-by-gene similarity matrix.
///
/// Genes are identified by their NCBI/Entrez ID.  Absent genes are no error, lookups
/// return `None`.
pub trait SimilarityMatrix: Send + Sync + std::fmt::Debug {
    /// Row (and column) index of `gene_id`.
    fn row_index_for_gene(&self, gene_id: u32) -> Option<usize>;

    /// Gene at the given row (and column) index.
    fn gene_id_at_row(&self, row: usize) -> Option<u32>;

    /// Column of `gene_id`, equal to its row.
    ///
    /// Backends reading from a store log read errors and return `None` for the affected
    /// gene.
    fn column_vector_for_gene(&self, gene_id: u32) -> Option<Array1<f32>>;

    /// Number of rows and columns.
    fn dimensions(&self) -> (usize, usize);

    /// Mapping from gene ID to row index.
    fn gene_row_indexes(&self) -> &IndexMap<u32, usize>;

    /// The complete matrix.
    fn full_matrix(&self) -> Result<&Array2<f32>, MatrixError>;

    fn contains_gene(&self, gene_id: u32) -> bool {
        self.row_index_for_gene(gene_id).is_some()
    }
}

/// Build the reverse of `gene_rows`, assuming all rows are in `0..rows`.
pub(crate) fn row_genes(gene_rows: &IndexMap<u32, usize>, rows: usize) -> Vec<Option<u32>> {
    let mut result = vec![None; rows];
    for (gene_id, row) in gene_rows {
        result[*row] = Some(*gene_id);
    }
    result
}

/// Check that all row indices in `gene_rows` are in `0..rows`.
pub(crate) fn check_row_indexes(
    gene_rows: &IndexMap<u32, usize>,
    rows: usize,
) -> Result<(), MatrixError> {
    match gene_rows.iter().find(|(_, row)| **row >= rows) {
        Some((gene_id, row)) => Err(MatrixError::RowIndexOutOfRange {
            gene_id: *gene_id,
            row: *row,
            rows,
        }),
        None => Ok(()),
    }
}

/// Matrix held completely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryMatrix {
    gene_rows: IndexMap<u32, usize>,
    row_genes: Vec<Option<u32>>,
    matrix: Array2<f32>,
}

impl InMemoryMatrix {
    /// Construct from gene index and matrix.
    ///
    /// # Errors
    ///
    /// If the matrix is not square, its row count differs from the index size, or a row
    /// index is out of range.
    pub fn new(gene_rows: IndexMap<u32, usize>, matrix: Array2<f32>) -> Result<Self, MatrixError> {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(MatrixError::NotSquare { rows, cols });
        }
        if rows != gene_rows.len() {
            return Err(MatrixError::RowCountMismatch {
                rows,
                index_size: gene_rows.len(),
            });
        }
        check_row_indexes(&gene_rows, rows)?;

        Ok(Self {
            row_genes: row_genes(&gene_rows, rows),
            gene_rows,
            matrix,
        })
    }
}

impl SimilarityMatrix for InMemoryMatrix {
    fn row_index_for_gene(&self, gene_id: u32) -> Option<usize> {
        self.gene_rows.get(&gene_id).copied()
    }

    fn gene_id_at_row(&self, row: usize) -> Option<u32> {
        self.row_genes.get(row).copied().flatten()
    }

    fn column_vector_for_gene(&self, gene_id: u32) -> Option<Array1<f32>> {
        self.row_index_for_gene(gene_id)
            .map(|row| self.matrix.row(row).to_owned())
    }

    fn dimensions(&self) -> (usize, usize) {
        self.matrix.dim()
    }

    fn gene_row_indexes(&self) -> &IndexMap<u32, usize> {
        &self.gene_rows
    }

    fn full_matrix(&self) -> Result<&Array2<f32>, MatrixError> {
        Ok(&self.matrix)
    }
}

/// Shared instance of `EmptyMatrix`.
static EMPTY_MATRIX: Lazy<Arc<EmptyMatrix>> = Lazy::new(|| {
    Arc::new(EmptyMatrix {
        gene_rows: IndexMap::new(),
        matrix: Array2::zeros((0, 0)),
    })
});

/// Matrix without any genes, for running without network data.
#[derive(Debug)]
pub struct EmptyMatrix {
    gene_rows: IndexMap<u32, usize>,
    matrix: Array2<f32>,
}

impl EmptyMatrix {
    /// Return the process-wide instance.
    pub fn instance() -> Arc<EmptyMatrix> {
        EMPTY_MATRIX.clone()
    }
}

impl SimilarityMatrix for EmptyMatrix {
    fn row_index_for_gene(&self, _gene_id: u32) -> Option<usize> {
        None
    }

    fn gene_id_at_row(&self, _row: usize) -> Option<u32> {
        None
    }

    fn column_vector_for_gene(&self, _gene_id: u32) -> Option<Array1<f32>> {
        None
    }

    fn dimensions(&self) -> (usize, usize) {
        (0, 0)
    }

    fn gene_row_indexes(&self) -> &IndexMap<u32, usize> {
        &self.gene_rows
    }

    fn full_matrix(&self) -> Result<&Array2<f32>, MatrixError> {
        Ok(&self.matrix)
    }
}
