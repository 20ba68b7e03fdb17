//! Index command implementation - write the row side index of a packed file

use anyhow::Result;
use biomatrix_core::{FloatCodec, PairCodec, RowKeyIndex, ValueCodec};
use std::path::PathBuf;

use crate::commands::require_file;
use crate::config::Config;
use crate::error::CliError;
use crate::CodecType;

pub fn execute(config: &Config, input: PathBuf, codec: Option<CodecType>) -> Result<()> {
    require_file(&input)?;
    if input.extension().is_some_and(|ext| ext == "gz") {
        return Err(CliError::invalid_format(format!(
            "{} is compressed; row indexes address uncompressed packed files",
            input.display()
        ))
        .into());
    }

    let bytes_per_value = match codec.unwrap_or(config.io.codec) {
        CodecType::Pair => PairCodec::BYTES_PER_VALUE,
        CodecType::Float => FloatCodec::BYTES_PER_VALUE,
    };
    log::info!("Indexing {} ({} bytes per cell)", input.display(), bytes_per_value);

    let (cols, index) = RowKeyIndex::build(&input, bytes_per_value).map_err(CliError::from)?;
    let side = RowKeyIndex::side_path(&input);
    index.save(&side).map_err(CliError::from)?;

    log::info!(
        "Indexed {} rows x {} columns into {}",
        index.len(),
        cols.len(),
        side.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_side_index() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("calls.txt");
        std::fs::write(&input, "var\tc1\tc2\nr1\tab??\nr2\tcdef\n")?;

        execute(&Config::default(), input.clone(), Some(CodecType::Pair))?;
        let index = RowKeyIndex::load(RowKeyIndex::side_path(&input))?;
        assert_eq!(index.len(), 2);
        assert_eq!(index.col_count(), 2);
        Ok(())
    }

    #[test]
    fn test_wrong_width_is_invalid_format() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("calls.txt");
        std::fs::write(&input, "var\tc1\nr1\tab\n").unwrap();

        let err = execute(&Config::default(), input, Some(CodecType::Float)).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::InvalidFormat { .. })));
    }
}
