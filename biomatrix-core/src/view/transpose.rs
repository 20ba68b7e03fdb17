use std::any::Any;
use std::sync::Arc;

use crate::error::MatrixResult;
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;

/// Swaps rows and columns of its parent
pub struct TransposeView<V: CellValue> {
    parent: MatrixRef<V>,
}

impl<V: CellValue> TransposeView<V> {
    pub fn parent(&self) -> &MatrixRef<V> {
        &self.parent
    }
}

/// Transposed view; transposing a transpose returns the original matrix
pub fn transpose<V: CellValue>(parent: MatrixRef<V>) -> MatrixRef<V> {
    if parent.kind() == ViewKind::Transpose {
        if let Some(inner) = parent.as_any().downcast_ref::<TransposeView<V>>() {
            return inner.parent.clone();
        }
    }
    Arc::new(TransposeView { parent })
}

impl<V: CellValue> Matrix<V> for TransposeView<V> {
    fn row_keys(&self) -> &KeyIndex {
        self.parent.col_keys()
    }

    fn col_keys(&self) -> &KeyIndex {
        self.parent.row_keys()
    }

    fn missing_value(&self) -> &V {
        self.parent.missing_value()
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        self.parent.read_at(col, row)
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        self.parent.write_at(col, row, value)
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Transpose
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DenseMatrix;

    #[test]
    fn test_transpose_swaps_axes() {
        let m = DenseMatrix::new_missing(["r1", "r2"], ["c1"], 0i32).unwrap();
        m.set("r2", "c1", 7).unwrap();
        let m: MatrixRef<i32> = Arc::new(m);

        let t = transpose(m.clone());
        assert_eq!(t.row_keys().keys(), ["c1"]);
        assert_eq!(t.get("c1", "r2").unwrap(), 7);
        t.set("c1", "r1", 3).unwrap();
        assert_eq!(m.get("r1", "c1").unwrap(), 3);
    }

    #[test]
    fn test_double_transpose_is_identity() {
        let m: MatrixRef<i32> = Arc::new(DenseMatrix::new_missing(["r1"], ["c1"], 0).unwrap());
        let back = transpose(transpose(m.clone()));
        assert!(Arc::ptr_eq(&back, &m));
    }
}
