//! Convert command implementation - read any recognised format, write another

use anyhow::{Context, Result};
use biomatrix_core::{io, FormatDispatcher, FloatCodec, Matrix, PairCodec, ParallelOptions, ValueCodec};
use std::path::{Path, PathBuf};

use crate::commands::require_file;
use crate::config::Config;
use crate::error::CliError;
use crate::{CodecType, OutputFormat};

pub fn execute(
    config: &Config,
    options: &ParallelOptions,
    input: PathBuf,
    out: PathBuf,
    to: Option<OutputFormat>,
    codec: Option<CodecType>,
) -> Result<()> {
    require_file(&input)?;
    let to = to.unwrap_or(config.io.output_format);
    log::info!("Converting {} to {:?} format", input.display(), to);

    match codec.unwrap_or(config.io.codec) {
        CodecType::Pair => convert(PairCodec, options, &input, &out, to),
        CodecType::Float => convert(FloatCodec, options, &input, &out, to),
    }
}

fn convert<C: ValueCodec>(
    codec: C,
    options: &ParallelOptions,
    input: &Path,
    out: &Path,
    to: OutputFormat,
) -> Result<()> {
    let dispatcher = FormatDispatcher::new(codec.clone());
    let matrix = dispatcher
        .parse(input, &codec.missing_value(), options)
        .map_err(CliError::from)?;
    log::info!(
        "Read {} rows x {} columns as {}",
        matrix.row_count(),
        matrix.col_count(),
        matrix.kind()
    );

    let written = match to {
        OutputFormat::Packed => io::write_packed_file(matrix.as_ref(), &codec, out),
        OutputFormat::Sparse => io::write_sparse_file(matrix.as_ref(), &codec, out),
        OutputFormat::Tab => io::write_tab_file(matrix.as_ref(), &codec, out),
    };
    written
        .map_err(CliError::from)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    log::info!("Matrix written to: {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_packed_to_sparse_and_back() -> Result<()> {
        let dir = TempDir::new()?;
        let packed = dir.path().join("calls.txt");
        std::fs::write(&packed, "var\tc1\tc2\nr1\tab??\nr2\tcdef\n")?;
        let sparse = dir.path().join("calls.sparse");
        let back = dir.path().join("back.txt");
        let config = Config::default();
        let options = ParallelOptions::sequential();

        execute(&config, &options, packed.clone(), sparse.clone(), Some(OutputFormat::Sparse), None)?;
        assert_eq!(
            std::fs::read_to_string(&sparse)?,
            "var\tcid\tval\nr1\tc1\tab\nr2\tc1\tcd\nr2\tc2\tef\n"
        );

        execute(&config, &options, sparse, back.clone(), Some(OutputFormat::Packed), Some(CodecType::Pair))?;
        assert_eq!(std::fs::read_to_string(&back)?, std::fs::read_to_string(&packed)?);
        Ok(())
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = execute(
            &Config::default(),
            &ParallelOptions::sequential(),
            dir.path().join("absent.txt"),
            dir.path().join("out.txt"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::FileNotFound { .. })));
    }
}
