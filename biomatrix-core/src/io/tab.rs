//! Dense tab-delimited format, one text token per cell

use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use crate::codec::ValueCodec;
use crate::error::{MatrixError, MatrixResult};
use crate::io::sparse::check_missing;
use crate::io::{check_key, file_keys, header_line, open_text, parse_header, trim_line_end};
use crate::matrix::Matrix;
use crate::store::DenseMatrix;

pub fn read_tab<C, P>(path: P, codec: &C) -> MatrixResult<DenseMatrix<C::Value>>
where
    C: ValueCodec,
    P: AsRef<Path>,
{
    parse_tab(open_text(path)?, codec)
}

pub fn parse_tab<C, R>(mut reader: R, codec: &C) -> MatrixResult<DenseMatrix<C::Value>>
where
    C: ValueCodec,
    R: BufRead,
{
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Err(MatrixError::format_at(1, "missing header line"));
    }
    let cols = file_keys(parse_header(&line)?, "header")?;
    let missing = codec.missing_value();

    let mut row_keys = Vec::new();
    let mut values = Vec::new();
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
        let mut fields = text.split('\t');
        let key = fields.next().unwrap_or_default();
        row_keys.push(key.to_string());

        let before = values.len();
        for token in fields {
            let value = codec.parse_token(token).map_err(|e| e.at_line(line_no))?;
            values.push(value.unwrap_or_else(|| missing.clone()));
        }
        let found = values.len() - before;
        if found != cols.len() {
            return Err(MatrixError::format_at(
                line_no,
                format!("expected {} values, found {}", cols.len(), found),
            ));
        }
    }

    DenseMatrix::from_parts(file_keys(row_keys, "row keys")?, cols, missing, values)
}

pub fn write_tab<M, C, W>(matrix: &M, codec: &C, writer: W) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
    W: Write,
{
    check_missing(matrix, codec)?;
    for key in matrix.col_keys().iter() {
        check_key(key)?;
    }
    let mut out = BufWriter::new(writer);
    writeln!(out, "{}", header_line(matrix.col_keys().iter()))?;

    for (row, key) in matrix.row_keys().iter().enumerate() {
        check_key(key)?;
        out.write_all(key.as_bytes())?;
        for col in 0..matrix.col_count() {
            let value = matrix.read_at(row, col)?;
            write!(out, "\t{}", codec.format_token(value.as_ref())?)?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_tab_file<M, C, P>(matrix: &M, codec: &C, path: P) -> MatrixResult<()>
where
    M: Matrix<C::Value> + ?Sized,
    C: ValueCodec,
    P: AsRef<Path>,
{
    write_tab(matrix, codec, std::fs::File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FloatCodec, PairCodec};

    #[test]
    fn test_round_trip() {
        let text = "var\tc1\tc2\nr1\tab\t??\nr2\tcd\tef\n";
        let m = parse_tab(text.as_bytes(), &PairCodec).unwrap();
        assert_eq!(m.present_count().unwrap(), 3);
        let mut out = Vec::new();
        write_tab(&m, &PairCodec, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);
    }

    #[test]
    fn test_short_row() {
        let err = parse_tab("var\tc1\tc2\nr1\t1.0\n".as_bytes(), &FloatCodec).unwrap_err();
        assert!(err.is_format());
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_nan_token_is_missing() {
        let m = parse_tab("var\tc1\tc2\nr1\tNaN\t2.5\n".as_bytes(), &FloatCodec).unwrap();
        assert_eq!(m.try_get("r1", "c1").unwrap(), None);
        assert_eq!(m.get("r1", "c2").unwrap(), 2.5);
    }
}
