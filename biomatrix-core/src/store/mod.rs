//! Matrix stores
//!
//! - [`DenseMatrix`]: one slot per cell, the materialization target
//! - [`SparseMatrix`]: present cells only
//! - [`DenseStructMatrix`]: codec-encoded bytes held in memory
//! - [`RowKeyedStructMatrix`]: codec-encoded bytes left on disk

pub mod dense;
pub mod dense_struct;
pub mod lease;
pub mod row_keyed;
pub mod sparse;

pub use dense::{DenseMatrix, Triple};
pub use dense_struct::DenseStructMatrix;
pub use lease::AccessPolicy;
pub use row_keyed::{RecordRegion, RowKeyIndex, RowKeyedStructMatrix};
pub use sparse::SparseMatrix;
