//! Error types for invariant violations detected at construction time.

/// Construction-time errors of the gene similarity matrices.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("matrix must be square but has {rows} rows and {cols} columns")]
    NotSquare { rows: usize, cols: usize },
    #[error("matrix has {rows} rows but gene index has {index_size} entries")]
    RowCountMismatch { rows: usize, index_size: usize },
    #[error("row index {row} of gene {gene_id} is out of range for {rows} rows")]
    RowIndexOutOfRange {
        gene_id: u32,
        row: usize,
        rows: usize,
    },
    #[error("row {row} has {len} values but {expected} were expected")]
    RowLengthMismatch {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("column family {0:?} missing from matrix store")]
    MissingColumnFamily(String),
    #[error("invalid value in matrix store for key {0:?}")]
    InvalidStoreValue(String),
    #[error("problem reading matrix store: {0}")]
    Store(String),
}

/// Construction-time errors of the phenotype match index.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhenoError {
    #[error("no query terms given for {0}")]
    EmptyQuery(String),
}
