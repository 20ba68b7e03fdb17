//! Merge-shards command implementation - join column shards of a packed matrix

use anyhow::Result;
use biomatrix_core::{merge_shard_dir, ByteRemap};
use regex::Regex;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{CliError, CliResult};

pub fn execute(
    config: &Config,
    dir: PathBuf,
    out: PathBuf,
    pattern: Option<String>,
    bytes_per_value: Option<usize>,
    remap: Vec<String>,
    json: bool,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(CliError::file_not_found(dir).into());
    }
    let pattern = pattern.unwrap_or_else(|| config.merge.pattern.clone());
    let pattern = Regex::new(&pattern).map_err(CliError::from)?;
    let bytes_per_value = bytes_per_value.unwrap_or(config.merge.bytes_per_value);
    if bytes_per_value == 0 {
        return Err(CliError::validation("bytes per value must be at least 1").into());
    }
    let remap = parse_remap(config.merge.remap.iter().chain(remap.iter()))?;

    log::info!("Merging shards in {} matching {}", dir.display(), pattern);
    if !remap.is_identity() {
        log::info!("Remapping cell bytes: {:?}", remap);
    }

    let summary = merge_shard_dir(&dir, &pattern, bytes_per_value, &remap, &out).map_err(CliError::from)?;
    log::info!(
        "Wrote {} rows x {} columns from {} shards to {}",
        summary.rows_written,
        summary.columns,
        summary.shards.len(),
        out.display()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Parse `FROM:TO` byte substitutions; later entries win
pub fn parse_remap<'a, I>(entries: I) -> CliResult<ByteRemap>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut pairs = Vec::new();
    for entry in entries {
        let (from, to) = entry
            .split_once(':')
            .ok_or_else(|| CliError::config(format!("remap entry '{}' is not FROM:TO", entry)))?;
        match (from.as_bytes(), to.as_bytes()) {
            ([from], [to]) => pairs.push((*from, *to)),
            _ => {
                return Err(CliError::config(format!(
                    "remap entry '{}' must map one byte to one byte",
                    entry
                )))
            }
        }
    }
    Ok(ByteRemap::from_pairs(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_remap() {
        let entries = vec!["a:A".to_string(), "c:G".to_string(), "a:T".to_string()];
        let remap = parse_remap(&entries).unwrap();
        assert_eq!(remap.map(b'a'), b'T');
        assert_eq!(remap.map(b'c'), b'G');
        assert_eq!(remap.map(b'?'), b'?');

        let bad = vec!["ab:c".to_string()];
        assert!(matches!(parse_remap(&bad), Err(CliError::Config { .. })));
        let bad = vec!["a".to_string()];
        assert!(parse_remap(&bad).is_err());
    }

    #[test]
    fn test_merges_directory() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("part1.txt"), "var\tc1\nr1\taa\nr2\tac\n")?;
        std::fs::write(dir.path().join("part2.txt"), "var\tc2\nr1\tcc\nr2\t??\n")?;
        let out = dir.path().join("merged.out");

        let mut config = Config::default();
        config.merge.remap = vec!["a:A".to_string()];
        execute(&config, dir.path().to_path_buf(), out.clone(), None, None, Vec::new(), false)?;

        assert_eq!(
            std::fs::read_to_string(&out)?,
            "var\tc1\tc2\nr1\tAAcc\nr2\tAc??\n"
        );
        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let err = execute(
            &Config::default(),
            PathBuf::from("/nonexistent/shards"),
            PathBuf::from("out.txt"),
            None,
            None,
            Vec::new(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::FileNotFound { .. })));
    }
}
