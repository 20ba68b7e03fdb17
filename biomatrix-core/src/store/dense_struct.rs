//! In-memory matrix over codec-encoded bytes
//!
//! The backing buffer is exactly what the packed text format stores after
//! each row key, so loading is a validated copy and saving is a plain write.

use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::path::Path;

use crate::codec::ValueCodec;
use crate::config::ParallelOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::io;
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, ViewKind};
use crate::store::Triple;

pub struct DenseStructMatrix<C: ValueCodec> {
    rows: KeyIndex,
    cols: KeyIndex,
    codec: C,
    missing: C::Value,
    bytes: RwLock<Vec<u8>>,
}

impl<C: ValueCodec> DenseStructMatrix<C> {
    /// An all-missing matrix
    pub fn new_missing(rows: KeyIndex, cols: KeyIndex, codec: C) -> Self {
        let bytes = codec.store_missing().repeat(rows.len() * cols.len());
        Self::from_parts(rows, cols, codec, bytes)
    }

    /// Wrap bytes whose rows have already been validated against the codec
    pub(crate) fn from_parts(rows: KeyIndex, cols: KeyIndex, codec: C, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), rows.len() * cols.len() * C::BYTES_PER_VALUE);
        let missing = codec.missing_value();
        Self {
            rows,
            cols,
            codec,
            missing,
            bytes: RwLock::new(bytes),
        }
    }

    /// Build from sparse entries on top of an all-missing buffer
    ///
    /// A cell listed twice is a consistency error.
    pub fn from_triples<I>(rows: KeyIndex, cols: KeyIndex, codec: C, triples: I) -> MatrixResult<Self>
    where
        I: IntoIterator<Item = Triple<C::Value>>,
    {
        let matrix = Self::new_missing(rows, cols, codec);
        {
            let mut bytes = matrix.bytes.write();
            for (row_key, col_key, value) in triples {
                let (row, col) = (matrix.row_index(&row_key)?, matrix.col_index(&col_key)?);
                if matrix.codec.is_missing(&value) {
                    return Err(MatrixError::usage(format!(
                        "entry ({}, {}) holds the missing value",
                        row_key, col_key
                    )));
                }
                let range = matrix.cell_range(row, col);
                if bytes[range.clone()] != *matrix.codec.store_missing() {
                    return Err(MatrixError::consistency(format!(
                        "cell ({}, {}) is listed more than once",
                        row_key, col_key
                    )));
                }
                matrix.codec.encode(&value, &mut bytes[range])?;
            }
        }
        Ok(matrix)
    }

    /// Load a packed text file
    pub fn load<P: AsRef<Path>>(path: P, codec: C) -> MatrixResult<Self> {
        io::read_packed(path, codec)
    }

    /// Load a packed text file, validating rows on a thread pool
    pub fn load_parallel<P: AsRef<Path>>(path: P, codec: C, options: &ParallelOptions) -> MatrixResult<Self> {
        io::read_packed_parallel(path, codec, options)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> MatrixResult<()> {
        io::write_packed_file(self, &self.codec, path)
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Copy of one row's packed bytes
    pub fn packed_row(&self, row: usize) -> Vec<u8> {
        let width = self.row_width();
        self.bytes.read()[row * width..(row + 1) * width].to_vec()
    }

    fn row_width(&self) -> usize {
        self.cols.len() * C::BYTES_PER_VALUE
    }

    fn cell_range(&self, row: usize, col: usize) -> std::ops::Range<usize> {
        let start = row * self.row_width() + col * C::BYTES_PER_VALUE;
        start..start + C::BYTES_PER_VALUE
    }
}

impl<C: ValueCodec> fmt::Debug for DenseStructMatrix<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseStructMatrix")
            .field("codec", &self.codec.name())
            .field("rows", &self.rows.len())
            .field("cols", &self.cols.len())
            .finish()
    }
}

impl<C: ValueCodec> Matrix<C::Value> for DenseStructMatrix<C> {
    fn row_keys(&self) -> &KeyIndex {
        &self.rows
    }

    fn col_keys(&self) -> &KeyIndex {
        &self.cols
    }

    fn missing_value(&self) -> &C::Value {
        &self.missing
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<C::Value>> {
        let range = self.cell_range(row, col);
        self.codec.decode_cell(&self.bytes.read()[range])
    }

    fn write_at(&self, row: usize, col: usize, value: Option<C::Value>) -> MatrixResult<()> {
        let mut cell = vec![0u8; C::BYTES_PER_VALUE];
        self.codec.encode_cell(value.as_ref(), &mut cell)?;
        let range = self.cell_range(row, col);
        self.bytes.write()[range].copy_from_slice(&cell);
        Ok(())
    }

    fn kind(&self) -> ViewKind {
        ViewKind::DenseStruct
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
