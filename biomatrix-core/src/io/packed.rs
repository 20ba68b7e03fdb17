//! Dense packed text format
//!
//! ```text
//! var<TAB>c1<TAB>c2
//! r1<TAB>ab??
//! r2<TAB>cdef
//! ```
//!
//! Each data line holds exactly `col_count * BYTES_PER_VALUE` bytes after the
//! tab. Files are memory-mapped for loading and every row is validated
//! against the codec before the matrix is returned.

use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::codec::ValueCodec;
use crate::config::ParallelOptions;
use crate::error::{MatrixError, MatrixResult};
use crate::io::{check_key, file_keys, header_line, parse_header, split_row_key, trim_line_end};
use crate::matrix::Matrix;
use crate::store::DenseStructMatrix;

/// Read a packed file on the calling thread
pub fn read_packed<C, P>(path: P, codec: C) -> MatrixResult<DenseStructMatrix<C>>
where
    C: ValueCodec,
    P: AsRef<Path>,
{
    read_packed_parallel(path, codec, &ParallelOptions::sequential())
}

/// Read a packed file, validating and copying rows on a thread pool
pub fn read_packed_parallel<C, P>(path: P, codec: C, options: &ParallelOptions) -> MatrixResult<DenseStructMatrix<C>>
where
    C: ValueCodec,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(MatrixError::format_at(1, "empty file, expected a header line"));
    }
    // SAFETY: the map is read-only and dropped before returning; the bytes are
    // copied into the matrix after validation.
    let mmap = unsafe { Mmap::map(&file)? };
    let matrix = parse_packed(&mmap, codec, options)?;
    log::debug!(
        "Read {}x{} packed matrix from {}",
        matrix.row_count(),
        matrix.col_count(),
        path.display()
    );
    Ok(matrix)
}

/// Parse packed text already in memory
pub fn parse_packed<C: ValueCodec>(data: &[u8], codec: C, options: &ParallelOptions) -> MatrixResult<DenseStructMatrix<C>> {
    let mut lines = data.split(|&b| b == b'\n').enumerate();
    let header = match lines.next() {
        Some((_, line)) if !line.is_empty() => line,
        _ => return Err(MatrixError::format_at(1, "missing header line")),
    };
    let cols = file_keys(parse_header(header)?, "header")?;

    let mut row_keys = Vec::new();
    let mut bodies = Vec::new();
    for (i, line) in lines {
        let line = trim_line_end(line);
        if line.is_empty() {
            continue;
        }
        let line_no = i + 1;
        let (key, body) = split_row_key(line, line_no)?;
        row_keys.push(key.to_string());
        bodies.push((line_no, body));
    }
    let rows = file_keys(row_keys, "row keys")?;

    let col_count = cols.len();
    let width = col_count * C::BYTES_PER_VALUE;
    let mut bytes = vec![0u8; rows.len() * width];
    let fill = |slot: &mut [u8], line_no: usize, body: &[u8]| -> MatrixResult<()> {
        codec.validate_line(body, col_count).map_err(|e| e.at_line(line_no))?;
        slot.copy_from_slice(body);
        Ok(())
    };

    if width == 0 {
        for &(line_no, body) in &bodies {
            fill(&mut bytes[..], line_no, body)?;
        }
    } else if options.is_sequential() {
        for (slot, &(line_no, body)) in bytes.chunks_mut(width).zip(&bodies) {
            fill(slot, line_no, body)?;
        }
    } else {
        options.install(|| {
            bytes
                .par_chunks_mut(width)
                .zip(bodies.par_iter())
                .try_for_each(|(slot, &(line_no, body))| fill(slot, line_no, body))
        })??;
    }

    Ok(DenseStructMatrix::from_parts(rows, cols, codec, bytes))
}

/// Write any matrix in packed form
///
/// The matrix's missing value must be the codec's; otherwise the stored
/// missing bytes would not round-trip.
pub fn write_packed<M, C, W>(matrix: &M, codec: &C, writer: W) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
    W: Write,
{
    if !codec.is_missing(matrix.missing_value()) {
        return Err(MatrixError::consistency(format!(
            "matrix missing value {:?} is not the {} codec's",
            matrix.missing_value(),
            codec.name()
        )));
    }
    for key in matrix.col_keys().iter() {
        check_key(key)?;
    }

    let mut out = BufWriter::new(writer);
    writeln!(out, "{}", header_line(matrix.col_keys().iter()))?;

    let packed = matrix.as_any().downcast_ref::<DenseStructMatrix<C>>();
    let mut line = vec![0u8; matrix.col_count() * C::BYTES_PER_VALUE];
    for (row, key) in matrix.row_keys().iter().enumerate() {
        check_key(key)?;
        match packed {
            Some(dense) => line.copy_from_slice(&dense.packed_row(row)),
            None => {
                for (col, cell) in line.chunks_exact_mut(C::BYTES_PER_VALUE).enumerate() {
                    codec.encode_cell(matrix.read_at(row, col)?.as_ref(), cell)?;
                }
            }
        }
        out.write_all(key.as_bytes())?;
        out.write_all(b"\t")?;
        out.write_all(&line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_packed_file<M, C, P>(matrix: &M, codec: &C, path: P) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
    P: AsRef<Path>,
{
    write_packed(matrix, codec, File::create(path)?)
}
