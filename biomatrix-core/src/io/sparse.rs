//! Sparse triple format
//!
//! ```text
//! var<TAB>cid<TAB>val
//! r1<TAB>c1<TAB>ab
//! r2<TAB>c2<TAB>ef
//! ```
//!
//! Only present cells are listed. Row and column keys are taken in the order
//! they are first seen.

use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use crate::codec::ValueCodec;
use crate::error::{MatrixError, MatrixResult};
use crate::io::{check_key, file_keys, open_text, trim_line_end, HEADER_TAG};
use crate::keys::KeyIndex;
use crate::matrix::Matrix;
use crate::store::SparseMatrix;

const SPARSE_HEADER: [&str; 3] = [HEADER_TAG, "cid", "val"];

pub fn read_sparse<C, P>(path: P, codec: &C) -> MatrixResult<SparseMatrix<C::Value>>
where
    C: ValueCodec,
    P: AsRef<Path>,
{
    parse_sparse(open_text(path)?, codec)
}

/// Parse sparse triples from any buffered reader
pub fn parse_sparse<C, R>(mut reader: R, codec: &C) -> MatrixResult<SparseMatrix<C::Value>>
where
    C: ValueCodec,
    R: BufRead,
{
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    let header = std::str::from_utf8(trim_line_end(&line)).unwrap_or_default();
    if !header.split('\t').eq(SPARSE_HEADER) {
        return Err(MatrixError::format_at(1, format!("expected header {:?}", SPARSE_HEADER.join("\t"))));
    }

    let mut row_keys: Vec<String> = Vec::new();
    let mut col_keys: Vec<String> = Vec::new();
    let mut row_seen = fnv::FnvHashMap::default();
    let mut col_seen = fnv::FnvHashMap::default();
    let mut cells = Vec::new();

    let mut line_no = 1;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        let content = trim_line_end(&line);
        if content.is_empty() {
            continue;
        }
        let text = std::str::from_utf8(content)
            .map_err(|_| MatrixError::format_at(line_no, "line is not valid UTF-8"))?;
        let fields: Vec<&str> = text.split('\t').collect();
        let [row_key, col_key, token] = fields[..] else {
            return Err(MatrixError::format_at(
                line_no,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        };

        let row = *row_seen.entry(row_key.to_string()).or_insert_with(|| {
            row_keys.push(row_key.to_string());
            row_keys.len() - 1
        });
        let col = *col_seen.entry(col_key.to_string()).or_insert_with(|| {
            col_keys.push(col_key.to_string());
            col_keys.len() - 1
        });
        if let Some(value) = codec.parse_token(token).map_err(|e| e.at_line(line_no))? {
            cells.push((line_no, row, col, value));
        }
    }

    let matrix = SparseMatrix::new_missing(
        file_keys(row_keys, "row keys")?,
        file_keys(col_keys, "column keys")?,
        codec.missing_value(),
    );
    for (line_no, row, col, value) in cells {
        if matrix.read_at(row, col)?.is_some() {
            return Err(MatrixError::format_at(line_no, "cell is listed more than once"));
        }
        matrix.write_at(row, col, Some(value))?;
    }
    Ok(matrix)
}

/// Write the present cells of any matrix, row-major
pub fn write_sparse<M, C, W>(matrix: &M, codec: &C, writer: W) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
    W: Write,
{
    check_missing(matrix, codec)?;
    let mut out = BufWriter::new(writer);
    writeln!(out, "{}", SPARSE_HEADER.join("\t"))?;

    let cols: &KeyIndex = matrix.col_keys();
    for key in cols.iter() {
        check_key(key)?;
    }
    for (row, row_key) in matrix.row_keys().iter().enumerate() {
        check_key(row_key)?;
        for (col, col_key) in cols.iter().enumerate() {
            if let Some(value) = matrix.read_at(row, col)? {
                writeln!(out, "{}\t{}\t{}", row_key, col_key, codec.format_token(Some(&value))?)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

pub fn write_sparse_file<M, C, P>(matrix: &M, codec: &C, path: P) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
    P: AsRef<Path>,
{
    write_sparse(matrix, codec, std::fs::File::create(path)?)
}

/// The matrix must use the codec's missing value for text output to round-trip
pub(crate) fn check_missing<M, C>(matrix: &M, codec: &C) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
{
    if !codec.is_missing(matrix.missing_value()) {
        return Err(MatrixError::consistency(format!(
            "matrix missing value {:?} is not the {} codec's",
            matrix.missing_value(),
            codec.name()
        )));
    }
    Ok(())
}
