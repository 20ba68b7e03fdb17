//! biomatrix core library
//!
//! Keyed 2-D matrices for biological data: the matrix contract, zero-copy
//! views, fixed-width value codecs, in-memory and disk-resident stores, text
//! formats, shard merging and format dispatch.

pub mod error;
pub mod value;
pub mod keys;
pub mod matrix;
pub mod codec;
pub mod config;
pub mod io;
pub mod store;
pub mod view;
pub mod materialize;
pub mod shard;
pub mod dispatch;

// Re-export commonly used types and functions
pub use error::{MatrixError, MatrixResult};
pub use value::{CellValue, UoPair};
pub use keys::KeyIndex;
pub use matrix::{LineView, Matrix, MatrixLines, MatrixRef, ViewKind};
pub use codec::{FloatCodec, PairCodec, ValueCodec};
pub use config::ParallelOptions;
pub use store::{AccessPolicy, DenseMatrix, DenseStructMatrix, RowKeyIndex, RowKeyedStructMatrix, SparseMatrix};
pub use materialize::{materialize, to_dense, to_dense_par};
pub use shard::{merge_shard_dir, merge_shards, ByteRemap, ShardMergeSummary};
pub use dispatch::{Diagnostics, FormatDispatcher};

/// Version information for the biomatrix core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
