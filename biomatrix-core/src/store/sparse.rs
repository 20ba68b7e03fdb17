//! Hash-map backed matrix holding only present cells

use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;

use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, ViewKind};
use crate::store::Triple;
use crate::value::CellValue;

pub struct SparseMatrix<V: CellValue> {
    rows: KeyIndex,
    cols: KeyIndex,
    missing: V,
    cells: RwLock<FnvHashMap<(usize, usize), V>>,
}

impl<V: CellValue> SparseMatrix<V> {
    pub fn new_missing(rows: KeyIndex, cols: KeyIndex, missing: V) -> Self {
        Self {
            rows,
            cols,
            missing,
            cells: RwLock::new(FnvHashMap::default()),
        }
    }

    /// Build from entries; a cell listed twice is a consistency error
    pub fn from_triples<I>(rows: KeyIndex, cols: KeyIndex, missing: V, triples: I) -> MatrixResult<Self>
    where
        I: IntoIterator<Item = Triple<V>>,
    {
        let matrix = Self::new_missing(rows, cols, missing);
        {
            let mut cells = matrix.cells.write();
            for (row_key, col_key, value) in triples {
                let index = (matrix.row_index(&row_key)?, matrix.col_index(&col_key)?);
                if matrix.is_missing(&value) {
                    continue;
                }
                if cells.insert(index, value).is_some() {
                    return Err(MatrixError::consistency(format!(
                        "cell ({}, {}) is listed more than once",
                        row_key, col_key
                    )));
                }
            }
        }
        Ok(matrix)
    }

    /// Present cells in row-major order
    pub fn present_cells(&self) -> Vec<(usize, usize, V)> {
        let mut cells: Vec<_> = self
            .cells
            .read()
            .iter()
            .map(|(&(row, col), value)| (row, col, value.clone()))
            .collect();
        cells.sort_by_key(|&(row, col, _)| (row, col));
        cells
    }
}

impl<V: CellValue> fmt::Debug for SparseMatrix<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMatrix")
            .field("rows", &self.rows.len())
            .field("cols", &self.cols.len())
            .field("present", &self.cells.read().len())
            .finish()
    }
}

impl<V: CellValue> Matrix<V> for SparseMatrix<V> {
    fn row_keys(&self) -> &KeyIndex {
        &self.rows
    }

    fn col_keys(&self) -> &KeyIndex {
        &self.cols
    }

    fn missing_value(&self) -> &V {
        &self.missing
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        Ok(self.cells.read().get(&(row, col)).cloned())
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        let mut cells = self.cells.write();
        match value {
            Some(v) => {
                cells.insert((row, col), v);
            }
            None => {
                cells.remove(&(row, col));
            }
        }
        Ok(())
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Sparse
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn present_count(&self) -> MatrixResult<usize> {
        Ok(self.cells.read().len())
    }
}
