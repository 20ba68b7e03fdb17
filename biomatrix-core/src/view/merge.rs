//! Row-wise and column-wise merges of several matrices
//!
//! The two directions differ on repeated keys. A row merge accepts a row key
//! present in several inputs when those inputs agree on every cell of it; a
//! column merge rejects any repeated column key.

use fnv::FnvHashSet;
use std::any::Any;
use std::sync::Arc;

use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAxis {
    Rows,
    Cols,
}

struct Source<V: CellValue> {
    matrix: MatrixRef<V>,
    /// view row -> source row
    rows: Vec<Option<usize>>,
    /// view col -> source col
    cols: Vec<Option<usize>>,
}

impl<V: CellValue> Source<V> {
    fn new(matrix: MatrixRef<V>, rows: &KeyIndex, cols: &KeyIndex) -> Self {
        let row_map = rows.iter().map(|key| matrix.row_keys().index_of(key)).collect();
        let col_map = cols.iter().map(|key| matrix.col_keys().index_of(key)).collect();
        Self {
            matrix,
            rows: row_map,
            cols: col_map,
        }
    }

    fn locate(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        Some((self.rows[row]?, self.cols[col]?))
    }
}

/// Union of several matrices along one axis
///
/// Reads come from the first input holding the cell; writes go to every
/// input holding it.
pub struct MergeView<V: CellValue> {
    axis: MergeAxis,
    rows: KeyIndex,
    cols: KeyIndex,
    missing: V,
    sources: Vec<Source<V>>,
}

impl<V: CellValue> MergeView<V> {
    pub fn axis(&self) -> MergeAxis {
        self.axis
    }

    pub fn sources(&self) -> impl Iterator<Item = &MatrixRef<V>> + '_ {
        self.sources.iter().map(|s| &s.matrix)
    }
}

/// Stack matrices vertically
///
/// With `cols_must_match` every input must have the same column keys in the
/// same order; otherwise the columns are the first input's, and an input
/// lacking one of them reads as missing there. Rows are the union in
/// first-seen order.
pub fn merge_rows<V: CellValue>(cols_must_match: bool, mut matrices: Vec<MatrixRef<V>>) -> MatrixResult<MatrixRef<V>> {
    check_operands(&matrices)?;
    if matrices.len() == 1 {
        return Ok(matrices.remove(0));
    }
    let cols = axis_keys(&matrices, |m| m.col_keys(), cols_must_match, "column")?;
    let rows = KeyIndex::new(union_keys(&matrices, |m| m.row_keys()))?;
    let missing = matrices[0].missing_value().clone();

    let sources: Vec<Source<V>> = matrices.into_iter().map(|m| Source::new(m, &rows, &cols)).collect();
    check_duplicate_rows(&sources, &rows, &cols)?;

    Ok(Arc::new(MergeView {
        axis: MergeAxis::Rows,
        rows,
        cols,
        missing,
        sources,
    }))
}

/// Stack matrices horizontally
///
/// Rows follow the rules `merge_rows` applies to columns. A column key
/// appearing in more than one input is a consistency error.
pub fn merge_cols<V: CellValue>(rows_must_match: bool, mut matrices: Vec<MatrixRef<V>>) -> MatrixResult<MatrixRef<V>> {
    check_operands(&matrices)?;
    if matrices.len() == 1 {
        return Ok(matrices.remove(0));
    }
    let rows = axis_keys(&matrices, |m| m.row_keys(), rows_must_match, "row")?;

    let mut cols = Vec::new();
    let mut seen = FnvHashSet::default();
    for matrix in &matrices {
        for key in matrix.col_keys().iter() {
            if !seen.insert(key) {
                return Err(MatrixError::consistency(format!(
                    "column '{}' appears in more than one merged matrix",
                    key
                )));
            }
            cols.push(key.to_string());
        }
    }
    let cols = KeyIndex::new(cols)?;
    let missing = matrices[0].missing_value().clone();

    let sources = matrices.into_iter().map(|m| Source::new(m, &rows, &cols)).collect();
    Ok(Arc::new(MergeView {
        axis: MergeAxis::Cols,
        rows,
        cols,
        missing,
        sources,
    }))
}

/// At least one input, all with mutually compatible missing values
fn check_operands<V: CellValue>(matrices: &[MatrixRef<V>]) -> MatrixResult<()> {
    let first = matrices
        .first()
        .ok_or_else(|| MatrixError::usage("merge needs at least one matrix"))?;
    for other in &matrices[1..] {
        if !first.is_missing(other.missing_value()) || !other.is_missing(first.missing_value()) {
            return Err(MatrixError::consistency(format!(
                "missing values {:?} and {:?} are not compatible",
                first.missing_value(),
                other.missing_value()
            )));
        }
    }
    Ok(())
}

/// Keys of the non-merged axis: the first matrix's, which every other
/// matrix must repeat exactly when `must_match`
fn axis_keys<V, F>(matrices: &[MatrixRef<V>], keys_of: F, must_match: bool, what: &str) -> MatrixResult<KeyIndex>
where
    V: CellValue,
    F: Fn(&dyn Matrix<V>) -> &KeyIndex,
{
    let first = keys_of(matrices[0].as_ref());
    if must_match {
        for other in &matrices[1..] {
            if keys_of(other.as_ref()) != first {
                return Err(MatrixError::consistency(format!(
                    "{} keys differ between merged matrices: {:?} vs {:?}",
                    what,
                    first,
                    keys_of(other.as_ref())
                )));
            }
        }
    }
    Ok(first.clone())
}

fn union_keys<V, F>(matrices: &[MatrixRef<V>], keys_of: F) -> Vec<String>
where
    V: CellValue,
    F: Fn(&dyn Matrix<V>) -> &KeyIndex,
{
    let mut seen = FnvHashSet::default();
    let mut keys = Vec::new();
    for matrix in matrices {
        for key in keys_of(matrix.as_ref()).iter() {
            if seen.insert(key) {
                keys.push(key.to_string());
            }
        }
    }
    keys
}

/// Rows held by several inputs must agree cell for cell; missing only matches missing
fn check_duplicate_rows<V: CellValue>(sources: &[Source<V>], rows: &KeyIndex, cols: &KeyIndex) -> MatrixResult<()> {
    for (row, row_key) in rows.iter().enumerate() {
        let holders: Vec<(&Source<V>, usize)> = sources
            .iter()
            .filter_map(|s| s.rows[row].map(|r| (s, r)))
            .collect();
        let Some(((base, base_row), others)) = holders.split_first() else {
            continue;
        };
        for &(other, other_row) in others {
            for col in 0..cols.len() {
                let (Some(a), Some(b)) = (base.cols[col], other.cols[col]) else {
                    continue;
                };
                let agree = match (base.matrix.read_at(*base_row, a)?, other.matrix.read_at(other_row, b)?) {
                    (None, None) => true,
                    (Some(x), Some(y)) => x.same_as(&y),
                    _ => false,
                };
                if !agree {
                    return Err(MatrixError::consistency(format!(
                        "row '{}' disagrees between merged matrices at column '{}'",
                        row_key,
                        cols.key(col).unwrap_or_default()
                    )));
                }
            }
        }
    }
    Ok(())
}

impl<V: CellValue> Matrix<V> for MergeView<V> {
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
        for source in &self.sources {
            if let Some((r, c)) = source.locate(row, col) {
                return source.matrix.read_at(r, c);
            }
        }
        Ok(None)
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        let mut written = false;
        for source in &self.sources {
            if let Some((r, c)) = source.locate(row, col) {
                source.matrix.write_at(r, c, value.clone())?;
                written = true;
            }
        }
        if !written && value.is_some() {
            return Err(MatrixError::usage(format!(
                "no merged matrix holds cell ({}, {})",
                self.rows.key(row).unwrap_or_default(),
                self.cols.key(col).unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn kind(&self) -> ViewKind {
        match self.axis {
            MergeAxis::Rows => ViewKind::MergeRows,
            MergeAxis::Cols => ViewKind::MergeCols,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
