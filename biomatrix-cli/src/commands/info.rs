//! Info command implementation - dimensions and missing-value statistics

use anyhow::Result;
use biomatrix_core::{
    to_dense_par, FloatCodec, FormatDispatcher, Matrix, MatrixRef, PairCodec, ParallelOptions, ValueCodec, ViewKind,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::commands::require_file;
use crate::config::Config;
use crate::error::CliError;
use crate::CodecType;

/// Summary of one matrix file
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub file: PathBuf,
    pub format: String,
    pub rows: usize,
    pub cols: usize,
    pub present: usize,
    pub missing: usize,
    pub rows_all_missing: usize,
    pub cols_all_missing: usize,
}

impl InfoReport {
    pub fn missing_fraction(&self) -> f64 {
        let cells = self.rows * self.cols;
        if cells == 0 {
            0.0
        } else {
            self.missing as f64 / cells as f64
        }
    }
}

pub fn execute(
    config: &Config,
    options: &ParallelOptions,
    input: PathBuf,
    codec: Option<CodecType>,
    json: bool,
) -> Result<()> {
    require_file(&input)?;
    let report = match codec.unwrap_or(config.io.codec) {
        CodecType::Pair => inspect(PairCodec, options, &input)?,
        CodecType::Float => inspect(FloatCodec, options, &input)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File:              {}", report.file.display());
        println!("Format:            {}", report.format);
        println!("Dimensions:        {} rows x {} columns", report.rows, report.cols);
        println!("Present cells:     {}", report.present);
        println!(
            "Missing cells:     {} ({:.2}%)",
            report.missing,
            100.0 * report.missing_fraction()
        );
        println!("All-missing rows:  {}", report.rows_all_missing);
        println!("All-missing cols:  {}", report.cols_all_missing);
    }
    Ok(())
}

pub fn inspect<C: ValueCodec>(codec: C, options: &ParallelOptions, input: &Path) -> Result<InfoReport> {
    let dispatcher = FormatDispatcher::new(codec.clone());
    let parsed = dispatcher
        .parse(input, &codec.missing_value(), options)
        .map_err(CliError::from)?;
    let format = parsed.kind().name().to_string();

    // Scans below touch every cell; disk-resident stores are loaded first
    let matrix: MatrixRef<C::Value> = if parsed.kind() == ViewKind::RowKeyedStruct {
        Arc::new(to_dense_par(parsed.as_ref(), options).map_err(CliError::from)?)
    } else {
        parsed
    };

    let present = matrix.present_count().map_err(CliError::from)?;
    let mut rows_all_missing = 0;
    for key in matrix.row_keys().iter() {
        if matrix.is_missing_all_in_row(key).map_err(CliError::from)? {
            rows_all_missing += 1;
        }
    }
    let mut cols_all_missing = 0;
    for key in matrix.col_keys().iter() {
        if matrix.is_missing_all_in_col(key).map_err(CliError::from)? {
            cols_all_missing += 1;
        }
    }

    let (rows, cols) = (matrix.row_count(), matrix.col_count());
    Ok(InfoReport {
        file: input.to_path_buf(),
        format,
        rows,
        cols,
        present,
        missing: rows * cols - present,
        rows_all_missing,
        cols_all_missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counts_missing_cells() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("calls.txt");
        std::fs::write(&input, "var\tc1\tc2\tc3\nr1\tab????\nr2\tcd??ef\n")?;

        let report = inspect(PairCodec, &ParallelOptions::sequential(), &input)?;
        assert_eq!(report.format, "dense-struct");
        assert_eq!((report.rows, report.cols), (2, 3));
        assert_eq!(report.present, 3);
        assert_eq!(report.missing, 3);
        assert_eq!(report.rows_all_missing, 0);
        assert_eq!(report.cols_all_missing, 1);
        assert!((report.missing_fraction() - 0.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_float_tab_file() -> Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("expr.tsv");
        std::fs::write(&input, "var\tg1\tg2\ns1\tNaN\tNaN\ns2\t2.5\t-1e-3\n")?;

        let report = inspect(FloatCodec, &ParallelOptions::new(2), &input)?;
        assert_eq!(report.format, "dense");
        assert_eq!(report.present, 2);
        assert_eq!(report.rows_all_missing, 1);
        Ok(())
    }
}
