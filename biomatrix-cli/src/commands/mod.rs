//! Command implementations for the biomatrix CLI

pub mod convert;
pub mod index;
pub mod info;
pub mod merge_shards;

use std::path::Path;

use crate::error::{CliError, CliResult};

/// Fail early with a readable error when an input file does not exist
pub fn require_file(path: &Path) -> CliResult<()> {
    if !path.is_file() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    Ok(())
}
