//! Array-backed in-memory matrix
//!
//! `DenseMatrix` keeps one slot per cell in row-major order, with the
//! sentinel standing in for missing cells. It is the target of
//! materialization and the fastest store for repeated random access.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::any::Any;
use std::fmt;

use crate::config::ParallelOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, ViewKind};
use crate::value::CellValue;

/// One (row key, col key, value) entry of a sparse listing
pub type Triple<V> = (String, String, V);

pub struct DenseMatrix<V: CellValue> {
    rows: KeyIndex,
    cols: KeyIndex,
    missing: V,
    values: RwLock<Vec<V>>,
}

impl<V: CellValue> DenseMatrix<V> {
    /// An all-missing matrix over the given keys
    pub fn new_missing<R, C, S, T>(rows: R, cols: C, missing: V) -> MatrixResult<Self>
    where
        R: IntoIterator<Item = S>,
        C: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Ok(Self::from_keys(KeyIndex::new(rows)?, KeyIndex::new(cols)?, missing))
    }

    pub fn from_keys(rows: KeyIndex, cols: KeyIndex, missing: V) -> Self {
        let values = vec![missing.clone(); rows.len() * cols.len()];
        Self {
            rows,
            cols,
            missing,
            values: RwLock::new(values),
        }
    }

    /// Wrap a row-major buffer in which the sentinel marks missing cells
    pub fn from_parts(rows: KeyIndex, cols: KeyIndex, missing: V, values: Vec<V>) -> MatrixResult<Self> {
        if values.len() != rows.len() * cols.len() {
            return Err(MatrixError::usage(format!(
                "buffer of {} values does not fit {}x{}",
                values.len(),
                rows.len(),
                cols.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            missing,
            values: RwLock::new(values),
        })
    }

    /// Fill from a function of (row, col); `None` leaves the cell missing
    pub fn from_fn<F>(rows: KeyIndex, cols: KeyIndex, missing: V, mut f: F) -> MatrixResult<Self>
    where
        F: FnMut(usize, usize) -> MatrixResult<Option<V>>,
    {
        let mut values = Vec::with_capacity(rows.len() * cols.len());
        for row in 0..rows.len() {
            for col in 0..cols.len() {
                values.push(f(row, col)?.unwrap_or_else(|| missing.clone()));
            }
        }
        Self::from_parts(rows, cols, missing, values)
    }

    /// Build from sparse entries. Each cell may be listed at most once.
    pub fn from_triples<I>(rows: KeyIndex, cols: KeyIndex, missing: V, triples: I) -> MatrixResult<Self>
    where
        I: IntoIterator<Item = Triple<V>>,
    {
        let matrix = Self::from_keys(rows, cols, missing);
        {
            let mut values = matrix.values.write();
            let width = matrix.cols.len();
            for (row_key, col_key, value) in triples {
                let (row, col) = (matrix.row_index(&row_key)?, matrix.col_index(&col_key)?);
                if matrix.is_missing(&value) {
                    return Err(MatrixError::usage(format!(
                        "entry ({}, {}) holds the missing value",
                        row_key, col_key
                    )));
                }
                let slot = &mut values[row * width + col];
                if !slot.same_as(&matrix.missing) {
                    return Err(duplicate_cell(&row_key, &col_key));
                }
                *slot = value;
            }
        }
        Ok(matrix)
    }

    /// Parallel form of [`DenseMatrix::from_triples`]
    ///
    /// Entries are bucketed by row and each row slice is filled by one task,
    /// so no two tasks ever touch the same slot.
    pub fn from_triples_par(
        rows: KeyIndex,
        cols: KeyIndex,
        missing: V,
        triples: Vec<Triple<V>>,
        options: &ParallelOptions,
    ) -> MatrixResult<Self> {
        let width = cols.len();
        if options.is_sequential() || width == 0 {
            return Self::from_triples(rows, cols, missing, triples);
        }

        let mut buckets: Vec<Vec<(usize, Triple<V>)>> = vec![Vec::new(); rows.len()];
        for triple in triples {
            let row = rows
                .index_of(&triple.0)
                .ok_or_else(|| MatrixError::unknown_row(&triple.0))?;
            let col = cols
                .index_of(&triple.1)
                .ok_or_else(|| MatrixError::unknown_col(&triple.1))?;
            buckets[row].push((col, triple));
        }

        let mut values = vec![missing.clone(); rows.len() * width];
        options.install(|| {
            values
                .par_chunks_mut(width)
                .zip(buckets.into_par_iter())
                .try_for_each(|(slots, bucket)| {
                    for (col, (row_key, col_key, value)) in bucket {
                        if value.same_as(&missing) {
                            return Err(MatrixError::usage(format!(
                                "entry ({}, {}) holds the missing value",
                                row_key, col_key
                            )));
                        }
                        if !slots[col].same_as(&missing) {
                            return Err(duplicate_cell(&row_key, &col_key));
                        }
                        slots[col] = value;
                    }
                    Ok(())
                })
        })??;

        Self::from_parts(rows, cols, missing, values)
    }

    /// Copy of the row-major buffer
    pub fn to_vec(&self) -> Vec<V> {
        self.values.read().clone()
    }

    pub fn into_parts(self) -> (KeyIndex, KeyIndex, V, Vec<V>) {
        (self.rows, self.cols, self.missing, self.values.into_inner())
    }
}

fn duplicate_cell(row_key: &str, col_key: &str) -> MatrixError {
    MatrixError::consistency(format!("cell ({}, {}) is listed more than once", row_key, col_key))
}

impl<V: CellValue> Clone for DenseMatrix<V> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            cols: self.cols.clone(),
            missing: self.missing.clone(),
            values: RwLock::new(self.to_vec()),
        }
    }
}

impl<V: CellValue> fmt::Debug for DenseMatrix<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseMatrix")
            .field("rows", &self.rows.len())
            .field("cols", &self.cols.len())
            .field("missing", &self.missing)
            .finish()
    }
}

impl<V: CellValue> Matrix<V> for DenseMatrix<V> {
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
        let value = &self.values.read()[row * self.cols.len() + col];
        if value.same_as(&self.missing) {
            Ok(None)
        } else {
            Ok(Some(value.clone()))
        }
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        let width = self.cols.len();
        self.values.write()[row * width + col] = value.unwrap_or_else(|| self.missing.clone());
        Ok(())
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Dense
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(k: &[&str]) -> KeyIndex {
        KeyIndex::new(k.iter().copied()).unwrap()
    }

    fn triples() -> Vec<Triple<f64>> {
        vec![
            ("r1".into(), "c2".into(), 1.5),
            ("r2".into(), "c1".into(), -2.0),
            ("r3".into(), "c3".into(), 0.25),
        ]
    }

    #[test]
    fn test_from_triples() {
        let m = DenseMatrix::from_triples(keys(&["r1", "r2", "r3"]), keys(&["c1", "c2", "c3"]), f64::NAN, triples())
            .unwrap();
        assert_eq!(m.get("r1", "c2").unwrap(), 1.5);
        assert_eq!(m.try_get("r1", "c1").unwrap(), None);
        assert_eq!(m.present_count().unwrap(), 3);
    }

    #[test]
    fn test_from_triples_rejects_repeated_cell() {
        let mut entries = triples();
        entries.push(("r1".into(), "c2".into(), 3.0));
        let err = DenseMatrix::from_triples(keys(&["r1", "r2", "r3"]), keys(&["c1", "c2", "c3"]), f64::NAN, entries)
            .unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rows: Vec<String> = (0..50).map(|i| format!("r{}", i)).collect();
        let cols: Vec<String> = (0..20).map(|i| format!("c{}", i)).collect();
        let entries: Vec<Triple<i64>> = (0..50)
            .flat_map(|r| (0..20).filter(move |c| (r + c) % 3 == 0).map(move |c| (r, c)))
            .map(|(r, c)| (format!("r{}", r), format!("c{}", c), (r * 100 + c) as i64))
            .collect();

        let seq = DenseMatrix::from_triples(
            KeyIndex::new(rows.clone()).unwrap(),
            KeyIndex::new(cols.clone()).unwrap(),
            -1,
            entries.clone(),
        )
        .unwrap();
        let par = DenseMatrix::from_triples_par(
            KeyIndex::new(rows).unwrap(),
            KeyIndex::new(cols).unwrap(),
            -1,
            entries,
            &ParallelOptions::new(4),
        )
        .unwrap();
        assert!(seq.matrix_equals(&par).unwrap());
    }

    #[test]
    fn test_parallel_rejects_repeated_cell() {
        let mut entries = triples();
        entries.push(("r3".into(), "c3".into(), 9.0));
        let err = DenseMatrix::from_triples_par(
            keys(&["r1", "r2", "r3"]),
            keys(&["c1", "c2", "c3"]),
            f64::NAN,
            entries,
            &ParallelOptions::new(2),
        )
        .unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn test_unknown_key_in_triples() {
        let entries = vec![("r9".to_string(), "c1".to_string(), 1.0)];
        let err = DenseMatrix::from_triples(keys(&["r1"]), keys(&["c1"]), f64::NAN, entries).unwrap_err();
        assert!(err.is_lookup());
    }
}
