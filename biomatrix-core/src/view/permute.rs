use std::any::Any;
use std::sync::Arc;

use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;

/// Reorders column contents while keeping the column keys in place
///
/// `view[r, c] = parent[r, perm[c]]`.
pub struct PermuteValuesView<V: CellValue> {
    parent: MatrixRef<V>,
    perm: Vec<usize>,
}

impl<V: CellValue> PermuteValuesView<V> {
    pub fn parent(&self) -> &MatrixRef<V> {
        &self.parent
    }

    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }
}

fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

fn check_permutation(perm: &[usize], len: usize) -> MatrixResult<()> {
    if perm.len() != len {
        return Err(MatrixError::usage(format!(
            "permutation has {} entries for {} columns",
            perm.len(),
            len
        )));
    }
    let mut seen = vec![false; len];
    for &p in perm {
        if p >= len || std::mem::replace(&mut seen[p], true) {
            return Err(MatrixError::usage(format!("{:?} is not a permutation of 0..{}", perm, len)));
        }
    }
    Ok(())
}

/// Permute the values of every row across columns
///
/// The identity returns the parent. A permutation of a permutation is
/// composed into a single view over the grandparent, which is returned
/// directly when the composition is the identity.
pub fn permute_values<V: CellValue>(parent: MatrixRef<V>, perm: Vec<usize>) -> MatrixResult<MatrixRef<V>> {
    check_permutation(&perm, parent.col_count())?;
    if is_identity(&perm) {
        return Ok(parent);
    }

    if parent.kind() == ViewKind::PermuteValues {
        if let Some(inner) = parent.as_any().downcast_ref::<PermuteValuesView<V>>() {
            let composed: Vec<usize> = perm.iter().map(|&c| inner.perm[c]).collect();
            if is_identity(&composed) {
                return Ok(inner.parent.clone());
            }
            return Ok(Arc::new(PermuteValuesView {
                parent: inner.parent.clone(),
                perm: composed,
            }));
        }
    }

    Ok(Arc::new(PermuteValuesView { parent, perm }))
}

impl<V: CellValue> Matrix<V> for PermuteValuesView<V> {
    fn row_keys(&self) -> &KeyIndex {
        self.parent.row_keys()
    }

    fn col_keys(&self) -> &KeyIndex {
        self.parent.col_keys()
    }

    fn missing_value(&self) -> &V {
        self.parent.missing_value()
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        self.parent.read_at(row, self.perm[col])
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        self.parent.write_at(row, self.perm[col], value)
    }

    fn kind(&self) -> ViewKind {
        ViewKind::PermuteValues
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
