//! Merging column-chunked packed files into one
//!
//! Shards are packed text files produced by workers that each handled a
//! slice of the columns. Later shards may have lost rows along the way, so
//! each shard's row keys are an ordered subset of the previous shard's. The
//! merged file keeps only rows present in every shard.
//!
//! Merging streams: one line per shard is held in memory at a time.

use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{MatrixError, MatrixResult};
use crate::io::{header_line, parse_header, split_row_key, trim_line_end};

/// Byte-for-byte translation applied to cell bytes while merging
#[derive(Clone, PartialEq, Eq)]
pub struct ByteRemap([u8; 256]);

impl ByteRemap {
    pub fn identity() -> Self {
        let mut table = [0u8; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self(table)
    }

    /// Identity except for the listed `(from, to)` pairs
    pub fn from_pairs<I: IntoIterator<Item = (u8, u8)>>(pairs: I) -> Self {
        let mut remap = Self::identity();
        for (from, to) in pairs {
            remap.0[from as usize] = to;
        }
        remap
    }

    pub fn map(&self, byte: u8) -> u8 {
        self.0[byte as usize]
    }

    pub fn apply(&self, bytes: &mut [u8]) {
        for byte in bytes {
            *byte = self.0[*byte as usize];
        }
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &b)| i == b as usize)
    }
}

impl Default for ByteRemap {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[u8; 256]> for ByteRemap {
    fn from(table: [u8; 256]) -> Self {
        Self(table)
    }
}

impl std::fmt::Debug for ByteRemap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let changed: Vec<(char, char)> = self
            .0
            .iter()
            .enumerate()
            .filter(|&(i, &b)| i != b as usize)
            .map(|(i, &b)| (char::from(i as u8), char::from(b)))
            .collect();
        f.debug_tuple("ByteRemap").field(&changed).finish()
    }
}

/// What a merge did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardMergeSummary {
    pub shards: Vec<PathBuf>,
    pub columns: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
}

/// Files in `dir` whose names match `pattern`, sorted by name
pub fn shard_files<P: AsRef<Path>>(dir: P, pattern: &Regex) -> MatrixResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if pattern.is_match(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// One shard being read in step with the others
struct ShardReader {
    path: PathBuf,
    reader: BufReader<File>,
    width: usize,
    line_no: usize,
    line: Vec<u8>,
    /// Row key and body offset of the line currently held, if any
    pending: Option<(String, usize)>,
}

impl ShardReader {
    fn open(path: &Path, bytes_per_value: usize) -> MatrixResult<(Self, Vec<String>)> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = Vec::new();
        if reader.read_until(b'\n', &mut header)? == 0 {
            return Err(shard_error(path, MatrixError::format_at(1, "empty file, expected a header line")));
        }
        let cols = parse_header(&header).map_err(|e| shard_error(path, e))?;
        let mut shard = Self {
            path: path.to_path_buf(),
            reader,
            width: cols.len() * bytes_per_value,
            line_no: 1,
            line: Vec::new(),
            pending: None,
        };
        shard.advance()?;
        Ok((shard, cols))
    }

    /// Load the next non-empty data line
    fn advance(&mut self) -> MatrixResult<()> {
        self.pending = None;
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(());
            }
            self.line_no += 1;
            let content_len = trim_line_end(&self.line).len();
            self.line.truncate(content_len);
            if self.line.is_empty() {
                continue;
            }

            let (key, body) = split_row_key(&self.line, self.line_no).map_err(|e| shard_error(&self.path, e))?;
            if body.len() != self.width {
                return Err(shard_error(
                    &self.path,
                    MatrixError::format_at(
                        self.line_no,
                        format!("expected {} bytes of cells, found {}", self.width, body.len()),
                    ),
                ));
            }
            self.pending = Some((key.to_string(), key.len() + 1));
            return Ok(());
        }
    }

    fn pending_key(&self) -> Option<&str> {
        self.pending.as_ref().map(|(key, _)| key.as_str())
    }

    fn body(&self) -> &[u8] {
        match &self.pending {
            Some((_, start)) => &self.line[*start..],
            None => &[],
        }
    }
}

fn shard_error(path: &Path, err: MatrixError) -> MatrixError {
    match err {
        MatrixError::Format { message } => MatrixError::format(format!("{}: {}", path.display(), message)),
        other => other,
    }
}

/// Merge packed shards, in the order given, into `writer`
///
/// The merged header lists every shard's columns in shard order. A row is
/// written when every shard holds it; its cells are the shards' bytes back
/// to back, translated through `remap`. A later shard holding a row key that
/// does not appear, in order, in the first shard is a format error.
pub fn merge_shards<W: Write>(
    shards: &[PathBuf],
    bytes_per_value: usize,
    remap: &ByteRemap,
    writer: W,
) -> MatrixResult<ShardMergeSummary> {
    if shards.is_empty() {
        return Err(MatrixError::usage("no shard files to merge"));
    }

    let mut readers = Vec::with_capacity(shards.len());
    let mut columns = Vec::new();
    for path in shards {
        let (reader, cols) = ShardReader::open(path, bytes_per_value)?;
        log::info!("Shard {} has {} columns", path.display(), cols.len());
        columns.extend(cols);
        readers.push(reader);
    }

    let mut out = BufWriter::new(writer);
    writeln!(out, "{}", header_line(columns.iter().map(String::as_str)))?;

    let (first, rest) = readers.split_at_mut(1);
    let driver = &mut first[0];
    let mut cells = Vec::new();
    let mut rows_written = 0;
    let mut rows_dropped = 0;

    while let Some(key) = driver.pending_key().map(str::to_string) {
        cells.clear();
        cells.extend_from_slice(driver.body());
        let mut complete = true;
        for shard in rest.iter_mut() {
            if shard.pending_key() == Some(key.as_str()) {
                cells.extend_from_slice(shard.body());
                shard.advance()?;
            } else {
                complete = false;
            }
        }

        if complete {
            remap.apply(&mut cells);
            out.write_all(key.as_bytes())?;
            out.write_all(b"\t")?;
            out.write_all(&cells)?;
            out.write_all(b"\n")?;
            rows_written += 1;
        } else {
            log::debug!("Dropping row {} missing from a later shard", key);
            rows_dropped += 1;
        }
        driver.advance()?;
    }

    for shard in rest.iter() {
        if let Some(key) = shard.pending_key() {
            return Err(MatrixError::format(format!(
                "{}: line {}: row '{}' is not in the first shard, or is out of order",
                shard.path.display(),
                shard.line_no,
                key
            )));
        }
    }
    out.flush()?;

    if rows_dropped > 0 {
        log::warn!("Dropped {} rows not present in every shard", rows_dropped);
    }
    log::info!("Merged {} shards: {} rows x {} columns", shards.len(), rows_written, columns.len());

    Ok(ShardMergeSummary {
        shards: shards.to_vec(),
        columns: columns.len(),
        rows_written,
        rows_dropped,
    })
}

/// Select shards in `dir` by file name pattern and merge them into `output`
pub fn merge_shard_dir<P, Q>(
    dir: P,
    pattern: &Regex,
    bytes_per_value: usize,
    remap: &ByteRemap,
    output: Q,
) -> MatrixResult<ShardMergeSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let shards = shard_files(&dir, pattern)?;
    if shards.is_empty() {
        return Err(MatrixError::usage(format!(
            "no files in {} match {}",
            dir.as_ref().display(),
            pattern
        )));
    }
    merge_shards(&shards, bytes_per_value, remap, File::create(output)?)
}
