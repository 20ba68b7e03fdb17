//! Copying any matrix or view into a [`DenseMatrix`]

use rayon::prelude::*;
use std::sync::Arc;

use crate::config::ParallelOptions;
use crate::error::MatrixResult;
use crate::matrix::{Matrix, MatrixRef, ViewKind};
use crate::store::DenseMatrix;
use crate::value::CellValue;
use crate::view::TransposeView;

/// Copy every cell of `matrix` into a new dense store
///
/// Dense stores and transposes of dense stores are copied buffer to buffer;
/// anything else is read cell by cell.
pub fn to_dense<V: CellValue>(matrix: &dyn Matrix<V>) -> MatrixResult<DenseMatrix<V>> {
    if let Some(dense) = matrix.as_any().downcast_ref::<DenseMatrix<V>>() {
        return Ok(dense.clone());
    }
    if matrix.kind() == ViewKind::Transpose {
        if let Some(view) = matrix.as_any().downcast_ref::<TransposeView<V>>() {
            if let Some(dense) = view.parent().as_any().downcast_ref::<DenseMatrix<V>>() {
                return transposed_copy(dense);
            }
        }
    }
    DenseMatrix::from_fn(
        matrix.row_keys().clone(),
        matrix.col_keys().clone(),
        matrix.missing_value().clone(),
        |row, col| matrix.read_at(row, col),
    )
}

/// Parallel form of [`to_dense`]; each row is filled by one task
pub fn to_dense_par<V: CellValue>(matrix: &dyn Matrix<V>, options: &ParallelOptions) -> MatrixResult<DenseMatrix<V>> {
    let width = matrix.col_count();
    if options.is_sequential() || width == 0 || matrix.kind() == ViewKind::Dense {
        return to_dense(matrix);
    }
    let missing = matrix.missing_value().clone();
    let mut values = vec![missing.clone(); matrix.row_count() * width];
    options.install(|| {
        values
            .par_chunks_mut(width)
            .enumerate()
            .try_for_each(|(row, slots)| -> MatrixResult<()> {
                for (col, slot) in slots.iter_mut().enumerate() {
                    if let Some(value) = matrix.read_at(row, col)? {
                        *slot = value;
                    }
                }
                Ok(())
            })
    })??;
    DenseMatrix::from_parts(matrix.row_keys().clone(), matrix.col_keys().clone(), missing, values)
}

/// Materialize into a shared handle; dense stores are returned as they are
pub fn materialize<V: CellValue>(matrix: MatrixRef<V>) -> MatrixResult<MatrixRef<V>> {
    if matrix.kind() == ViewKind::Dense {
        return Ok(matrix);
    }
    Ok(Arc::new(to_dense(matrix.as_ref())?))
}

fn transposed_copy<V: CellValue>(dense: &DenseMatrix<V>) -> MatrixResult<DenseMatrix<V>> {
    let (rows, cols) = (dense.row_count(), dense.col_count());
    let source = dense.to_vec();
    let mut values = Vec::with_capacity(source.len());
    for col in 0..cols {
        for row in 0..rows {
            values.push(source[row * cols + col].clone());
        }
    }
    DenseMatrix::from_parts(
        dense.col_keys().clone(),
        dense.row_keys().clone(),
        dense.missing_value().clone(),
        values,
    )
}
