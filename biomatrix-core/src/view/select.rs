use std::any::Any;
use std::sync::Arc;

use crate::error::MatrixResult;
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;

/// A subset and reordering of its parent's rows and columns
pub struct SelectView<V: CellValue> {
    parent: MatrixRef<V>,
    rows: KeyIndex,
    cols: KeyIndex,
    row_map: Vec<usize>,
    col_map: Vec<usize>,
}

impl<V: CellValue> SelectView<V> {
    pub fn parent(&self) -> &MatrixRef<V> {
        &self.parent
    }
}

/// View over the given rows and columns, in the given order
///
/// Every key must exist in `parent`. Selecting exactly the parent's keys
/// returns the parent; selecting from a selection reads the grandparent
/// directly.
pub fn select<V, R, C, S, T>(parent: MatrixRef<V>, rows: R, cols: C) -> MatrixResult<MatrixRef<V>>
where
    V: CellValue,
    R: IntoIterator<Item = S>,
    C: IntoIterator<Item = T>,
    S: Into<String>,
    T: Into<String>,
{
    let rows = KeyIndex::new(rows)?;
    let cols = KeyIndex::new(cols)?;
    for key in rows.iter() {
        parent.row_index(key)?;
    }
    for key in cols.iter() {
        parent.col_index(key)?;
    }

    if *parent.row_keys() == rows && *parent.col_keys() == cols {
        return Ok(parent);
    }

    let flattened = match parent.kind() {
        ViewKind::Select => parent
            .as_any()
            .downcast_ref::<SelectView<V>>()
            .map(|inner| inner.parent.clone()),
        _ => None,
    };
    let base = flattened.unwrap_or(parent);
    if *base.row_keys() == rows && *base.col_keys() == cols {
        return Ok(base);
    }

    let row_map = rows.iter().map(|key| base.row_index(key)).collect::<MatrixResult<_>>()?;
    let col_map = cols.iter().map(|key| base.col_index(key)).collect::<MatrixResult<_>>()?;
    Ok(Arc::new(SelectView {
        parent: base,
        rows,
        cols,
        row_map,
        col_map,
    }))
}

/// Select rows, keeping every column
pub fn select_rows<V, R, S>(parent: MatrixRef<V>, rows: R) -> MatrixResult<MatrixRef<V>>
where
    V: CellValue,
    R: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cols = parent.col_keys().keys().to_vec();
    select(parent, rows, cols)
}

/// Select columns, keeping every row
pub fn select_cols<V, C, T>(parent: MatrixRef<V>, cols: C) -> MatrixResult<MatrixRef<V>>
where
    V: CellValue,
    C: IntoIterator<Item = T>,
    T: Into<String>,
{
    let rows = parent.row_keys().keys().to_vec();
    select(parent, rows, cols)
}

impl<V: CellValue> Matrix<V> for SelectView<V> {
    fn row_keys(&self) -> &KeyIndex {
        &self.rows
    }

    fn col_keys(&self) -> &KeyIndex {
        &self.cols
    }

    fn missing_value(&self) -> &V {
        self.parent.missing_value()
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        self.parent.read_at(self.row_map[row], self.col_map[col])
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        self.parent.write_at(self.row_map[row], self.col_map[col], value)
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Select
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DenseMatrix;

    fn grid() -> MatrixRef<i32> {
        let m = DenseMatrix::new_missing(["r1", "r2", "r3"], ["c1", "c2", "c3"], -1).unwrap();
        for (r, row) in ["r1", "r2", "r3"].iter().enumerate() {
            for (c, col) in ["c1", "c2", "c3"].iter().enumerate() {
                m.set(row, col, (r * 10 + c) as i32).unwrap();
            }
        }
        Arc::new(m)
    }

    #[test]
    fn test_select_reorders() {
        let m = grid();
        let s = select(m.clone(), ["r3", "r1"], ["c2"]).unwrap();
        assert_eq!(s.row_count(), 2);
        assert_eq!(s.get_at(0, 0).unwrap(), 21);
        assert_eq!(s.get("r1", "c2").unwrap(), 1);
        assert!(s.try_get("r2", "c2").unwrap().is_none());
    }

    #[test]
    fn test_select_everything_returns_parent() {
        let m = grid();
        let s = select(m.clone(), ["r1", "r2", "r3"], ["c1", "c2", "c3"]).unwrap();
        assert!(Arc::ptr_eq(&s, &m));
    }

    #[test]
    fn test_select_of_select_flattens() {
        let m = grid();
        let outer = select_rows(select_rows(m.clone(), ["r3", "r2"]).unwrap(), ["r2"]).unwrap();
        let inner = outer.as_any().downcast_ref::<SelectView<i32>>().unwrap();
        assert!(Arc::ptr_eq(inner.parent(), &m));
        assert_eq!(outer.get("r2", "c3").unwrap(), 12);
    }

    #[test]
    fn test_reselecting_a_selection_returns_it() {
        let m = grid();
        let s = select_rows(m.clone(), ["r2"]).unwrap();
        assert!(Arc::ptr_eq(&select_rows(s.clone(), ["r2"]).unwrap(), &s));

        let narrowed = select(m.clone(), ["r3", "r1"], ["c2", "c1"]).unwrap();
        let again = select(narrowed.clone(), ["r3", "r1"], ["c2", "c1"]).unwrap();
        assert!(Arc::ptr_eq(&again, &narrowed));
    }

    #[test]
    fn test_unknown_key_is_lookup_error() {
        let m = grid();
        assert!(select_cols(m.clone(), ["c9"]).unwrap_err().is_lookup());
        let narrowed = select_rows(m, ["r1"]).unwrap();
        assert!(select_rows(narrowed, ["r2"]).unwrap_err().is_lookup());
    }

    #[test]
    fn test_writes_pass_through() {
        let m = grid();
        let s = select_cols(m.clone(), ["c3"]).unwrap();
        s.remove("r1", "c3").unwrap();
        assert_eq!(m.try_get("r1", "c3").unwrap(), None);
    }
}
