//! Fixed-width value codecs
//!
//! A codec turns one cell value into exactly `BYTES_PER_VALUE` bytes and
//! back. The same contract backs the in-memory dense struct store, the
//! disk-resident row-keyed store and the packed text format, where a data
//! line is the row key, a tab, and the cells' bytes back to back.

pub mod float;
pub mod pair;

pub use float::FloatCodec;
pub use pair::PairCodec;

use crate::error::{MatrixError, MatrixResult};
use crate::value::CellValue;

/// Bidirectional fixed-width encoding for one value type
pub trait ValueCodec: Clone + Send + Sync + 'static {
    type Value: CellValue;

    /// Width of one encoded cell
    const BYTES_PER_VALUE: usize;

    /// Short identifier used in diagnostics
    fn name(&self) -> &'static str;

    /// In-memory sentinel for a missing cell
    fn missing_value(&self) -> Self::Value;

    /// Stored bytes of a missing cell. Exactly `BYTES_PER_VALUE` long.
    fn store_missing(&self) -> &[u8];

    /// Encode a present value into `out` (`BYTES_PER_VALUE` bytes)
    fn encode(&self, value: &Self::Value, out: &mut [u8]) -> MatrixResult<()>;

    /// Decode the bytes of a present value, validating them
    fn decode(&self, bytes: &[u8]) -> MatrixResult<Self::Value>;

    fn is_missing(&self, value: &Self::Value) -> bool {
        value.same_as(&self.missing_value())
    }

    /// Encode a cell; `None` and the sentinel both store the missing bytes
    fn encode_cell(&self, value: Option<&Self::Value>, out: &mut [u8]) -> MatrixResult<()> {
        if out.len() != Self::BYTES_PER_VALUE {
            return Err(MatrixError::usage(format!(
                "{} cells are {} bytes, buffer has {}",
                self.name(),
                Self::BYTES_PER_VALUE,
                out.len()
            )));
        }
        match value {
            Some(v) if !self.is_missing(v) => self.encode(v, out),
            _ => {
                out.copy_from_slice(self.store_missing());
                Ok(())
            }
        }
    }

    fn decode_cell(&self, bytes: &[u8]) -> MatrixResult<Option<Self::Value>> {
        if bytes.len() != Self::BYTES_PER_VALUE {
            return Err(MatrixError::format(format!(
                "{} cells are {} bytes, found {}",
                self.name(),
                Self::BYTES_PER_VALUE,
                bytes.len()
            )));
        }
        if bytes == self.store_missing() {
            return Ok(None);
        }
        self.decode(bytes).map(Some)
    }

    /// Pack a row of cells with no delimiter
    fn encode_line(&self, values: &[Option<Self::Value>]) -> MatrixResult<Vec<u8>> {
        let mut packed = vec![0u8; values.len() * Self::BYTES_PER_VALUE];
        for (value, out) in values.iter().zip(packed.chunks_exact_mut(Self::BYTES_PER_VALUE)) {
            self.encode_cell(value.as_ref(), out)?;
        }
        Ok(packed)
    }

    /// Unpack a row of `col_count` cells
    fn decode_line(&self, packed: &[u8], col_count: usize) -> MatrixResult<Vec<Option<Self::Value>>> {
        self.check_line_len(packed, col_count)?;
        packed
            .chunks_exact(Self::BYTES_PER_VALUE)
            .map(|cell| self.decode_cell(cell))
            .collect()
    }

    /// Validate every cell of a packed row without keeping the values
    fn validate_line(&self, packed: &[u8], col_count: usize) -> MatrixResult<()> {
        self.check_line_len(packed, col_count)?;
        for cell in packed.chunks_exact(Self::BYTES_PER_VALUE) {
            self.decode_cell(cell)?;
        }
        Ok(())
    }

    fn check_line_len(&self, packed: &[u8], col_count: usize) -> MatrixResult<()> {
        let expected = col_count * Self::BYTES_PER_VALUE;
        if packed.len() != expected {
            return Err(MatrixError::format(format!(
                "expected {} bytes for {} columns, found {}",
                expected,
                col_count,
                packed.len()
            )));
        }
        Ok(())
    }

    /// Parse a free-standing text token (sparse and tab formats)
    fn parse_token(&self, token: &str) -> MatrixResult<Option<Self::Value>> {
        self.decode_cell(&latin1_bytes(token)?)
    }

    /// Text token for a cell, the inverse of `parse_token`
    fn format_token(&self, value: Option<&Self::Value>) -> MatrixResult<String> {
        let mut bytes = vec![0u8; Self::BYTES_PER_VALUE];
        self.encode_cell(value, &mut bytes)?;
        Ok(latin1_string(&bytes))
    }
}

/// Map each character to one byte; characters above U+00FF are rejected
pub fn latin1_bytes(text: &str) -> MatrixResult<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| MatrixError::format(format!("character {:?} does not fit in a byte", c)))
        })
        .collect()
}

/// Inverse of [`latin1_bytes`]
pub fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
