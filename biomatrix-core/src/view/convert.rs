use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::MatrixResult;
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::value::CellValue;

/// A pair of plain functions converting between two cell types
///
/// Converters are compared by function identity, which is how a conversion
/// followed by its inverse is recognised and cancelled.
pub struct ValueConverter<P, V> {
    forward: fn(&P) -> V,
    backward: fn(&V) -> P,
}

impl<P, V> ValueConverter<P, V> {
    pub fn new(forward: fn(&P) -> V, backward: fn(&V) -> P) -> Self {
        Self { forward, backward }
    }

    pub fn forward(&self, value: &P) -> V {
        (self.forward)(value)
    }

    pub fn backward(&self, value: &V) -> P {
        (self.backward)(value)
    }

    /// The converter running the other way
    pub fn inverse(&self) -> ValueConverter<V, P> {
        ValueConverter {
            forward: self.backward,
            backward: self.forward,
        }
    }

    /// True when `other` is exactly this converter reversed
    pub fn is_inverse_of(&self, other: &ValueConverter<V, P>) -> bool {
        self.forward as usize == other.backward as usize && self.backward as usize == other.forward as usize
    }
}

impl<P, V> Clone for ValueConverter<P, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, V> Copy for ValueConverter<P, V> {}

impl<P, V> fmt::Debug for ValueConverter<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConverter")
            .field("forward", &(self.forward as usize as *const ()))
            .field("backward", &(self.backward as usize as *const ()))
            .finish()
    }
}

/// Its parent seen through a value conversion
///
/// Missing parent cells stay missing; writes are converted back.
pub struct ConvertValueView<P: CellValue, V: CellValue> {
    parent: MatrixRef<P>,
    converter: ValueConverter<P, V>,
    missing: V,
}

impl<P: CellValue, V: CellValue> ConvertValueView<P, V> {
    pub fn parent(&self) -> &MatrixRef<P> {
        &self.parent
    }

    pub fn converter(&self) -> &ValueConverter<P, V> {
        &self.converter
    }
}

/// Convert every cell of `parent` with `converter`; `missing` is the new sentinel
///
/// Converting a conversion by its exact inverse returns the original matrix.
pub fn convert_value<P, V>(parent: MatrixRef<P>, converter: ValueConverter<P, V>, missing: V) -> MatrixRef<V>
where
    P: CellValue,
    V: CellValue,
{
    if parent.kind() == ViewKind::ConvertValue {
        if let Some(inner) = parent.as_any().downcast_ref::<ConvertValueView<V, P>>() {
            if inner.converter.is_inverse_of(&converter) {
                return inner.parent.clone();
            }
        }
    }
    Arc::new(ConvertValueView {
        parent,
        converter,
        missing,
    })
}

impl<P: CellValue, V: CellValue> Matrix<V> for ConvertValueView<P, V> {
    fn row_keys(&self) -> &KeyIndex {
        self.parent.row_keys()
    }

    fn col_keys(&self) -> &KeyIndex {
        self.parent.col_keys()
    }

    fn missing_value(&self) -> &V {
        &self.missing
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<V>> {
        let value = self.parent.read_at(row, col)?.map(|v| self.converter.forward(&v));
        Ok(value.filter(|v| !v.same_as(&self.missing)))
    }

    fn write_at(&self, row: usize, col: usize, value: Option<V>) -> MatrixResult<()> {
        let value = value
            .map(|v| self.converter.backward(&v))
            .filter(|v| !self.parent.is_missing(v));
        self.parent.write_at(row, col, value)
    }

    fn kind(&self) -> ViewKind {
        ViewKind::ConvertValue
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
