//! Zero-storage views over matrices
//!
//! Every view is built by a factory that first looks at what it is wrapping.
//! When the requested view would undo or repeat the parent (a transpose of a
//! transpose, a selection of everything, a conversion followed by its
//! inverse) the factory returns an existing matrix instead of a new proxy,
//! so stacks of views stay shallow and `Arc::ptr_eq` identifies the result.

pub mod convert;
pub mod hashable;
pub mod merge;
pub mod permute;
pub mod rename;
pub mod select;
pub mod transpose;

pub use convert::{convert_value, ConvertValueView, ValueConverter};
pub use hashable::{content_digest, hashable, HashableView};
pub use merge::{merge_cols, merge_rows, MergeAxis, MergeView};
pub use permute::{permute_values, PermuteValuesView};
pub use rename::{rename_cols, rename_rows, RenameColsView};
pub use select::{select, select_cols, select_rows, SelectView};
pub use transpose::{transpose, TransposeView};
