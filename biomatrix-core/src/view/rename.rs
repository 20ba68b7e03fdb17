use std::any::Any;
use std::sync::Arc;

use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;
use crate::view::transpose;

/// Its parent under new column keys; positions are unchanged
pub struct RenameColsView<V: CellValue> {
    parent: MatrixRef<V>,
    cols: KeyIndex,
}

/// Rename columns by `(old, new)` pairs; unlisted columns keep their key
///
/// A rename that changes nothing returns the parent.
pub fn rename_cols<V, I, S, T>(parent: MatrixRef<V>, renames: I) -> MatrixResult<MatrixRef<V>>
where
    V: CellValue,
    I: IntoIterator<Item = (S, T)>,
    S: AsRef<str>,
    T: Into<String>,
{
    let mut cols = parent.col_keys().keys().to_vec();
    let mut renamed = vec![false; cols.len()];
    for (old, new) in renames {
        let index = parent.col_index(old.as_ref())?;
        if renamed[index] {
            return Err(MatrixError::usage(format!("column '{}' is renamed twice", old.as_ref())));
        }
        renamed[index] = true;
        cols[index] = new.into();
    }

    if parent.col_keys().same_sequence(&cols) {
        return Ok(parent);
    }
    let cols = KeyIndex::new(cols)?;
    Ok(Arc::new(RenameColsView { parent, cols }))
}

/// Rename rows by `(old, new)` pairs, as a column rename of the transpose
pub fn rename_rows<V, I, S, T>(parent: MatrixRef<V>, renames: I) -> MatrixResult<MatrixRef<V>>
where
    V: CellValue,
    I: IntoIterator<Item = (S, T)>,
    S: AsRef<str>,
    T: Into<String>,
{
    let renamed = rename_cols(transpose(parent), renames)?;
    Ok(transpose(renamed))
}

impl<V: CellValue> Matrix<V> for RenameColsView<V> {
    fn row_keys(&self) -> &KeyIndex {
        self.parent.row_keys()
    }

    fn col_keys(&self) -> &KeyIndex {
        &self.cols
    }

    fn missing_value(&self) -> &V {
        self.parent.missing_value()
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        self.parent.read_at(row, col)
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        self.parent.write_at(row, col, value)
    }

    fn kind(&self) -> ViewKind {
        ViewKind::RenameCols
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DenseMatrix;

    fn sample() -> MatrixRef<i32> {
        let m = DenseMatrix::new_missing(["r1", "r2"], ["c1", "c2"], 0).unwrap();
        m.set("r1", "c2", 5).unwrap();
        Arc::new(m)
    }

    #[test]
    fn test_rename_cols() {
        let m = sample();
        let r = rename_cols(m.clone(), [("c2", "sample_b")]).unwrap();
        assert_eq!(r.col_keys().keys(), ["c1", "sample_b"]);
        assert_eq!(r.get("r1", "sample_b").unwrap(), 5);
        assert!(r.try_get("r1", "c2").unwrap().is_none());
    }

    #[test]
    fn test_rename_rows_goes_through_transpose() {
        let m = sample();
        let r = rename_rows(m.clone(), [("r1", "first")]).unwrap();
        assert_eq!(r.kind(), ViewKind::Transpose);
        assert_eq!(r.row_keys().keys(), ["first", "r2"]);
        assert_eq!(r.get("first", "c2").unwrap(), 5);
    }

    #[test]
    fn test_identity_rename_returns_parent() {
        let m = sample();
        assert!(Arc::ptr_eq(&rename_cols(m.clone(), [("c1", "c1")]).unwrap(), &m));
        let none: [(&str, &str); 0] = [];
        assert!(Arc::ptr_eq(&rename_rows(m.clone(), none).unwrap(), &m));
    }

    #[test]
    fn test_rename_collision() {
        let m = sample();
        assert!(rename_cols(m.clone(), [("c1", "c2")]).unwrap_err().is_consistency());
        assert!(rename_cols(m, [("c9", "x")]).unwrap_err().is_lookup());
    }
}
