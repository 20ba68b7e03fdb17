//! Fixed-width text codec for `f64`, NaN as the missing value

use crate::codec::ValueCodec;
use crate::error::{MatrixError, MatrixResult};

/// Cell width. Fits the longest shortest-roundtrip form, `-2.2250738585072014e-308`.
pub const FLOAT_WIDTH: usize = 24;

const MISSING_TEXT: &[u8; FLOAT_WIDTH] = b"NaN                     ";

/// Stores an `f64` as left-aligned, space-padded scientific text
///
/// The text is the shortest representation that parses back to the same
/// bits, so decoding is exact. `NaN` is the only missing representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloatCodec;

impl ValueCodec for FloatCodec {
    type Value = f64;

    const BYTES_PER_VALUE: usize = FLOAT_WIDTH;

    fn name(&self) -> &'static str {
        "float"
    }

    fn missing_value(&self) -> f64 {
        f64::NAN
    }

    fn store_missing(&self) -> &[u8] {
        MISSING_TEXT
    }

    fn encode(&self, value: &f64, out: &mut [u8]) -> MatrixResult<()> {
        if value.is_nan() {
            return Err(MatrixError::usage("NaN is the missing value and has no value encoding"));
        }
        let text = format!("{:e}", value);
        if text.len() > FLOAT_WIDTH {
            return Err(MatrixError::format(format!("{} does not fit in {} bytes", text, FLOAT_WIDTH)));
        }
        out.fill(b' ');
        out[..text.len()].copy_from_slice(text.as_bytes());
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> MatrixResult<f64> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| MatrixError::format("float cell is not ASCII text"))?;
        parse_present(text.trim_end_matches(' '))
    }

    fn parse_token(&self, token: &str) -> MatrixResult<Option<f64>> {
        let token = token.trim();
        if token == "NaN" {
            return Ok(None);
        }
        parse_present(token).map(Some)
    }

    fn format_token(&self, value: Option<&f64>) -> MatrixResult<String> {
        match value {
            Some(v) if !v.is_nan() => Ok(format!("{:e}", v)),
            _ => Ok("NaN".to_string()),
        }
    }
}

fn parse_present(text: &str) -> MatrixResult<f64> {
    let value: f64 = text
        .parse()
        .map_err(|_| MatrixError::format(format!("'{}' is not a number", text)))?;
    if value.is_nan() {
        return Err(MatrixError::format(format!(
            "'{}' is an alternate spelling of the missing value",
            text
        )));
    }
    Ok(value)
}
