use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use xxhash_rust::xxh64::Xxh64;

use crate::error::MatrixResult;
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;

/// `std::hash::Hasher` over xxh64 so `CellValue::hash_cell` can feed it
struct XxHasher(Xxh64);

impl Hasher for XxHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        self.0.digest()
    }
}

/// Content digest of a matrix: keys in order, then every cell row-major
pub fn content_digest<V, M>(matrix: &M) -> MatrixResult<u64>
where
    V: CellValue,
    M: Matrix<V> + ?Sized,
{
    let mut hasher = XxHasher(Xxh64::new(0));
    for keys in [matrix.row_keys(), matrix.col_keys()] {
        hasher.write_usize(keys.len());
        for key in keys.iter() {
            hasher.write(key.as_bytes());
            hasher.write_u8(0xff);
        }
    }
    for row in 0..matrix.row_count() {
        for col in 0..matrix.col_count() {
            match matrix.read_at(row, col)? {
                Some(value) => {
                    hasher.write_u8(1);
                    value.hash_cell(&mut hasher);
                }
                None => hasher.write_u8(0),
            }
        }
    }
    Ok(hasher.finish())
}

/// Read-only view usable as a hash key
///
/// Equality is [`Matrix::matrix_equals`]; the hash is a content digest
/// computed on first use and cached, so the parent must not change while
/// the view is in use as a key.
pub struct HashableView<V: CellValue> {
    parent: MatrixRef<V>,
    digest: OnceLock<u64>,
}

impl<V: CellValue> HashableView<V> {
    pub fn parent(&self) -> &MatrixRef<V> {
        &self.parent
    }

    pub fn digest(&self) -> MatrixResult<u64> {
        if let Some(digest) = self.digest.get() {
            return Ok(*digest);
        }
        let digest = content_digest(self.parent.as_ref())?;
        Ok(*self.digest.get_or_init(|| digest))
    }
}

/// Wrap `parent` for hashing; wrapping a hashable view returns it unchanged
pub fn hashable<V: CellValue>(parent: MatrixRef<V>) -> MatrixRef<V> {
    if parent.kind() == ViewKind::Hashable {
        return parent;
    }
    Arc::new(HashableView {
        parent,
        digest: OnceLock::new(),
    })
}

impl<V: CellValue> PartialEq for HashableView<V> {
    fn eq(&self, other: &Self) -> bool {
        self.matrix_equals(other).unwrap_or(false)
    }
}

impl<V: CellValue> Eq for HashableView<V> {}

impl<V: CellValue> Hash for HashableView<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // unreadable parents hash as 0
        state.write_u64(self.digest().unwrap_or_default());
    }
}

impl<V: CellValue> Matrix<V> for HashableView<V> {
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
        self.parent.read_at(row, col)
    }

    fn write_at(&self, _row: usize, _col: usize, _value: Option<V>) -> MatrixResult<()> {
        Err(crate::error::MatrixError::read_only(ViewKind::Hashable.name()))
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Hashable
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
