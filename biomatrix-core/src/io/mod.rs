//! Text formats for matrices
//!
//! All formats share a header line that starts with the literal `var`:
//!
//! - packed (dense struct): `var\tc1\tc2`, then `row\t<cells back to back>`
//! - sparse triples: `var\tcid\tval`, then `row\tcol\tvalue` per present cell
//! - dense tab: `var\tc1\tc2`, then `row\tv1\tv2`
//!
//! Readers of the sparse and tab formats accept gzip input when the file
//! name ends in `.gz`.

pub mod packed;
pub mod sparse;
pub mod tab;

pub use packed::{read_packed, read_packed_parallel, write_packed, write_packed_file};
pub use sparse::{read_sparse, write_sparse, write_sparse_file};
pub use tab::{read_tab, write_tab, write_tab_file};

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{MatrixError, MatrixResult};
use crate::keys::KeyIndex;

/// First field of every header line
pub const HEADER_TAG: &str = "var";

/// Open a text file, decompressing it when the name ends in `.gz`
pub fn open_text<P: AsRef<Path>>(path: P) -> MatrixResult<Box<dyn BufRead>> {
    let file = File::open(&path)?;
    let path_str = path.as_ref().to_string_lossy();

    if path_str.ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read the first line of a file, cut to at most `max_chars` characters
pub fn first_line<P: AsRef<Path>>(path: P, max_chars: usize) -> MatrixResult<String> {
    let mut reader = open_text(path)?;
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(4 * max_chars as u64 + 4)
        .read_until(b'\n', &mut bytes)?;
    let line = String::from_utf8_lossy(trim_line_end(&bytes));
    Ok(line.chars().take(max_chars).collect())
}

/// Strip a trailing `\n` or `\r\n`
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse a `var\t...` header line into its remaining fields
pub fn parse_header(line: &[u8]) -> MatrixResult<Vec<String>> {
    let text = std::str::from_utf8(trim_line_end(line))
        .map_err(|_| MatrixError::format_at(1, "header is not valid UTF-8"))?;
    let mut fields = text.split('\t');
    match fields.next() {
        Some(HEADER_TAG) => Ok(fields.map(str::to_string).collect()),
        _ => Err(MatrixError::format_at(
            1,
            format!("header must start with '{}'", HEADER_TAG),
        )),
    }
}

/// Format a header line (without the newline)
pub fn header_line<'a, I: IntoIterator<Item = &'a str>>(fields: I) -> String {
    let mut line = String::from(HEADER_TAG);
    for field in fields {
        line.push('\t');
        line.push_str(field);
    }
    line
}

/// Keys are written verbatim, so they cannot contain field or line separators
pub fn check_key(key: &str) -> MatrixResult<()> {
    if key.contains(['\t', '\n', '\r']) {
        return Err(MatrixError::format(format!(
            "key {:?} contains a tab or line break",
            key
        )));
    }
    Ok(())
}

/// Build a key index from keys read out of a file; duplicates are a format error
pub fn file_keys(keys: Vec<String>, what: &str) -> MatrixResult<KeyIndex> {
    KeyIndex::new(keys).map_err(|e| match e {
        MatrixError::Consistency { message } => MatrixError::format(format!("{}: {}", what, message)),
        other => other,
    })
}

/// Split a data line at its first tab into (row key, rest)
pub fn split_row_key(line: &[u8], line_no: usize) -> MatrixResult<(&str, &[u8])> {
    let tab = line
        .iter()
        .position(|&b| b == b'\t')
        .ok_or_else(|| MatrixError::format_at(line_no, "missing tab after row key"))?;
    let key = std::str::from_utf8(&line[..tab])
        .map_err(|_| MatrixError::format_at(line_no, "row key is not valid UTF-8"))?;
    Ok((key, &line[tab + 1..]))
}
