//! The matrix contract shared by every store and every view
//!
//! A matrix is a pair of ordered key sequences, a missing-value sentinel and
//! a partial function from (row, col) to a value. Implementations provide the
//! handful of required methods; the rest of the contract (key-based access,
//! sentinel rules, scans, equality) is provided on top of them.
//!
//! Absence of a value and absence of a key are different conditions:
//! `get_or_missing` returns the sentinel for the first and a lookup error for
//! the second.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;
use crate::value::CellValue;

/// Shared handle to any matrix or view
pub type MatrixRef<V> = Arc<dyn Matrix<V>>;

/// Tag identifying the concrete store or view behind a [`MatrixRef`]
///
/// View factories match on the parent's tag to decide whether a new proxy
/// is needed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Dense,
    Sparse,
    DenseStruct,
    RowKeyedStruct,
    Transpose,
    Select,
    RenameCols,
    ConvertValue,
    PermuteValues,
    MergeRows,
    MergeCols,
    Hashable,
}

impl ViewKind {
    /// True for zero-storage proxies
    pub fn is_view(&self) -> bool {
        !matches!(
            self,
            ViewKind::Dense | ViewKind::Sparse | ViewKind::DenseStruct | ViewKind::RowKeyedStruct
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::Dense => "dense",
            ViewKind::Sparse => "sparse",
            ViewKind::DenseStruct => "dense-struct",
            ViewKind::RowKeyedStruct => "row-keyed-struct",
            ViewKind::Transpose => "transpose",
            ViewKind::Select => "select",
            ViewKind::RenameCols => "rename-cols",
            ViewKind::ConvertValue => "convert-value",
            ViewKind::PermuteValues => "permute-values",
            ViewKind::MergeRows => "merge-rows",
            ViewKind::MergeCols => "merge-cols",
            ViewKind::Hashable => "hashable",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keyed two-dimensional store with a missing-value sentinel
pub trait Matrix<V: CellValue>: Send + Sync + 'static {
    fn row_keys(&self) -> &KeyIndex;

    fn col_keys(&self) -> &KeyIndex;

    /// The sentinel standing for "no value"
    fn missing_value(&self) -> &V;

    /// Read one cell. Indices are in range; `Ok(None)` means missing.
    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>>;

    /// Write one cell. Indices are in range and `Some` never holds the sentinel.
    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()>;

    fn kind(&self) -> ViewKind;

    fn as_any(&self) -> &dyn Any;

    fn row_count(&self) -> usize {
        self.row_keys().len()
    }

    fn col_count(&self) -> usize {
        self.col_keys().len()
    }

    fn is_missing(&self, value: &V) -> bool {
        value.same_as(self.missing_value())
    }

    fn row_index(&self, row_key: &str) -> MatrixResult<usize> {
        self.row_keys()
            .index_of(row_key)
            .ok_or_else(|| MatrixError::unknown_row(row_key))
    }

    fn col_index(&self, col_key: &str) -> MatrixResult<usize> {
        self.col_keys()
            .index_of(col_key)
            .ok_or_else(|| MatrixError::unknown_col(col_key))
    }

    fn check_bounds(&self, row: usize, col: usize) -> MatrixResult<()> {
        if row >= self.row_count() || col >= self.col_count() {
            return Err(MatrixError::lookup(format!(
                "index ({}, {}) is outside a {}x{} matrix",
                row,
                col,
                self.row_count(),
                self.col_count()
            )));
        }
        Ok(())
    }

    /// `Ok(None)` for a missing cell or an out-of-range index
    fn try_get_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        if row >= self.row_count() || col >= self.col_count() {
            return Ok(None);
        }
        self.read_at(row, col)
    }

    /// `Ok(None)` for a missing cell or an unknown key
    fn try_get(&self, row_key: &str, col_key: &str) -> MatrixResult<Option<V>> {
        match (self.row_keys().index_of(row_key), self.col_keys().index_of(col_key)) {
            (Some(row), Some(col)) => self.read_at(row, col),
            _ => Ok(None),
        }
    }

    /// Lookup error when the cell is missing
    fn get_at(&self, row: usize, col: usize) -> MatrixResult<V> {
        self.check_bounds(row, col)?;
        self.read_at(row, col)?
            .ok_or_else(|| MatrixError::lookup(format!("no value at ({}, {})", row, col)))
    }

    fn get(&self, row_key: &str, col_key: &str) -> MatrixResult<V> {
        let (row, col) = (self.row_index(row_key)?, self.col_index(col_key)?);
        self.read_at(row, col)?.ok_or_else(|| {
            MatrixError::lookup(format!("no value at ({}, {})", row_key, col_key))
        })
    }

    /// The sentinel for a missing cell; lookup error for an unknown index
    fn get_or_missing_at(&self, row: usize, col: usize) -> MatrixResult<V> {
        self.check_bounds(row, col)?;
        Ok(self
            .read_at(row, col)?
            .unwrap_or_else(|| self.missing_value().clone()))
    }

    fn get_or_missing(&self, row_key: &str, col_key: &str) -> MatrixResult<V> {
        let (row, col) = (self.row_index(row_key)?, self.col_index(col_key)?);
        Ok(self
            .read_at(row, col)?
            .unwrap_or_else(|| self.missing_value().clone()))
    }

    /// Store a present value. Assigning the sentinel is a usage error.
    fn set_at(&self, row: usize, col: usize, value: V) -> MatrixResult<()> {
        self.check_bounds(row, col)?;
        if self.is_missing(&value) {
            return Err(MatrixError::usage(
                "cannot assign the missing value directly; use remove or set_or_missing",
            ));
        }
        self.write_at(row, col, Some(value))
    }

    fn set(&self, row_key: &str, col_key: &str, value: V) -> MatrixResult<()> {
        let (row, col) = (self.row_index(row_key)?, self.col_index(col_key)?);
        self.set_at(row, col, value)
    }

    fn remove_at(&self, row: usize, col: usize) -> MatrixResult<()> {
        self.check_bounds(row, col)?;
        self.write_at(row, col, None)
    }

    fn remove(&self, row_key: &str, col_key: &str) -> MatrixResult<()> {
        let (row, col) = (self.row_index(row_key)?, self.col_index(col_key)?);
        self.write_at(row, col, None)
    }

    /// Like `set_at`, but the sentinel removes the value
    fn set_or_missing_at(&self, row: usize, col: usize, value: V) -> MatrixResult<()> {
        if self.is_missing(&value) {
            self.remove_at(row, col)
        } else {
            self.set_at(row, col, value)
        }
    }

    fn set_or_missing(&self, row_key: &str, col_key: &str, value: V) -> MatrixResult<()> {
        let (row, col) = (self.row_index(row_key)?, self.col_index(col_key)?);
        self.set_or_missing_at(row, col, value)
    }

    /// True when no cell holds a value
    fn is_missing_all(&self) -> MatrixResult<bool> {
        for row in 0..self.row_count() {
            for col in 0..self.col_count() {
                if self.read_at(row, col)?.is_some() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// True when at least one cell is missing
    fn is_missing_some(&self) -> MatrixResult<bool> {
        for row in 0..self.row_count() {
            for col in 0..self.col_count() {
                if self.read_at(row, col)?.is_none() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn is_missing_all_in_row(&self, row_key: &str) -> MatrixResult<bool> {
        let row = self.row_index(row_key)?;
        for col in 0..self.col_count() {
            if self.read_at(row, col)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_missing_all_in_col(&self, col_key: &str) -> MatrixResult<bool> {
        let col = self.col_index(col_key)?;
        for row in 0..self.row_count() {
            if self.read_at(row, col)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Number of non-missing cells
    fn present_count(&self) -> MatrixResult<usize> {
        let mut count = 0;
        for row in 0..self.row_count() {
            for col in 0..self.col_count() {
                if self.read_at(row, col)?.is_some() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Same sentinel, same key sequences in the same order, same cells
    fn matrix_equals(&self, other: &dyn Matrix<V>) -> MatrixResult<bool> {
        if !self.is_missing(other.missing_value()) || !other.is_missing(self.missing_value()) {
            return Ok(false);
        }
        if self.row_keys() != other.row_keys() || self.col_keys() != other.col_keys() {
            return Ok(false);
        }
        for row in 0..self.row_count() {
            for col in 0..self.col_count() {
                let same = match (self.read_at(row, col)?, other.read_at(row, col)?) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.same_as(&b),
                    _ => false,
                };
                if !same {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl<V: CellValue> fmt::Debug for dyn Matrix<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("kind", &self.kind())
            .field("rows", &self.row_count())
            .field("cols", &self.col_count())
            .field("missing", self.missing_value())
            .finish()
    }
}

impl<V: CellValue> dyn Matrix<V> {
    /// Live map over the non-missing entries of one row, keyed by column
    pub fn row_view(&self, row_key: &str) -> MatrixResult<LineView<'_, V>> {
        let line = self.row_index(row_key)?;
        Ok(LineView {
            matrix: self,
            axis: Axis::Row,
            line,
        })
    }

    /// Live map over the non-missing entries of one column, keyed by row
    pub fn col_view(&self, col_key: &str) -> MatrixResult<LineView<'_, V>> {
        let line = self.col_index(col_key)?;
        Ok(LineView {
            matrix: self,
            axis: Axis::Col,
            line,
        })
    }
}

/// Line views on concrete stores, without boxing them into a [`MatrixRef`]
pub trait MatrixLines<V: CellValue> {
    fn row_view(&self, row_key: &str) -> MatrixResult<LineView<'_, V>>;

    fn col_view(&self, col_key: &str) -> MatrixResult<LineView<'_, V>>;
}

impl<V: CellValue, M: Matrix<V>> MatrixLines<V> for M {
    fn row_view(&self, row_key: &str) -> MatrixResult<LineView<'_, V>> {
        (self as &dyn Matrix<V>).row_view(row_key)
    }

    fn col_view(&self, col_key: &str) -> MatrixResult<LineView<'_, V>> {
        (self as &dyn Matrix<V>).col_view(col_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

/// Write-through map over one row or column of a matrix
///
/// Only non-missing entries are visible. Reads and writes go straight to the
/// matrix, so the view always reflects its current state.
pub struct LineView<'a, V: CellValue> {
    matrix: &'a dyn Matrix<V>,
    axis: Axis,
    line: usize,
}

impl<V: CellValue> std::fmt::Debug for LineView<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineView")
            .field("axis", &self.axis)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

impl<'a, V: CellValue> LineView<'a, V> {
    /// The row or column key this view is pinned to
    pub fn key(&self) -> &'a str {
        let keys = match self.axis {
            Axis::Row => self.matrix.row_keys(),
            Axis::Col => self.matrix.col_keys(),
        };
        keys.key(self.line).unwrap_or_default()
    }

    fn other_keys(&self) -> &'a KeyIndex {
        match self.axis {
            Axis::Row => self.matrix.col_keys(),
            Axis::Col => self.matrix.row_keys(),
        }
    }

    fn cell(&self, other: usize) -> (usize, usize) {
        match self.axis {
            Axis::Row => (self.line, other),
            Axis::Col => (other, self.line),
        }
    }

    fn other_index(&self, key: &str) -> MatrixResult<usize> {
        match self.axis {
            Axis::Row => self.matrix.col_index(key),
            Axis::Col => self.matrix.row_index(key),
        }
    }

    pub fn get(&self, key: &str) -> MatrixResult<Option<V>> {
        match self.other_keys().index_of(key) {
            Some(other) => {
                let (row, col) = self.cell(other);
                self.matrix.read_at(row, col)
            }
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &str) -> MatrixResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Store a value; the key must belong to the other axis
    pub fn insert(&self, key: &str, value: V) -> MatrixResult<()> {
        let (row, col) = self.cell(self.other_index(key)?);
        self.matrix.set_at(row, col, value)
    }

    /// Remove an entry, returning the previous value
    pub fn remove(&self, key: &str) -> MatrixResult<Option<V>> {
        let (row, col) = self.cell(self.other_index(key)?);
        let previous = self.matrix.read_at(row, col)?;
        if previous.is_some() {
            self.matrix.write_at(row, col, None)?;
        }
        Ok(previous)
    }

    pub fn entries(&self) -> MatrixResult<Vec<(&'a str, V)>> {
        let mut out = Vec::new();
        for (other, key) in self.other_keys().iter().enumerate() {
            let (row, col) = self.cell(other);
            if let Some(value) = self.matrix.read_at(row, col)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    pub fn keys(&self) -> MatrixResult<Vec<&'a str>> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    pub fn len(&self) -> MatrixResult<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> MatrixResult<bool> {
        for other in 0..self.other_keys().len() {
            let (row, col) = self.cell(other);
            if self.matrix.read_at(row, col)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
