//! Two-byte codec for unordered symbol pairs

use crate::codec::ValueCodec;
use crate::error::{MatrixError, MatrixResult};
use crate::value::UoPair;

/// Stores a [`UoPair`] as its two symbols, smaller first
///
/// A descending pair in the input is a format violation, as is a pair that
/// contains exactly one `?`. The only missing representation is `??`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairCodec;

impl ValueCodec for PairCodec {
    type Value = UoPair;

    const BYTES_PER_VALUE: usize = 2;

    fn name(&self) -> &'static str {
        "pair"
    }

    fn missing_value(&self) -> UoPair {
        UoPair::MISSING
    }

    fn store_missing(&self) -> &[u8] {
        b"??"
    }

    fn encode(&self, value: &UoPair, out: &mut [u8]) -> MatrixResult<()> {
        if value.is_missing() {
            return Err(MatrixError::usage("the missing pair has no value encoding"));
        }
        out.copy_from_slice(&value.as_bytes());
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> MatrixResult<UoPair> {
        match bytes {
            [first, second] => UoPair::sorted(*first, *second),
            _ => Err(MatrixError::format(format!(
                "pair cells are 2 bytes, found {}",
                bytes.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_token_parses() {
        let codec = PairCodec;
        let pair = codec.parse_token("ab").unwrap().unwrap();
        assert_eq!(pair.to_string(), "ab");
        assert_eq!(codec.parse_token("aa").unwrap().unwrap().to_string(), "aa");
    }

    #[test]
    fn test_descending_token_fails() {
        let err = PairCodec.parse_token("ba").unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(PairCodec.parse_token("??").unwrap(), None);
        assert!(PairCodec.parse_token("?a").unwrap_err().is_format());
        assert!(PairCodec.parse_token("abc").unwrap_err().is_format());
        assert_eq!(PairCodec.format_token(None).unwrap(), "??");
    }

    #[test]
    fn test_high_symbols_survive() {
        let codec = PairCodec;
        let pair = UoPair::new(0xE9, b'a').unwrap();
        let token = codec.format_token(Some(&pair)).unwrap();
        assert_eq!(codec.parse_token(&token).unwrap(), Some(pair));
    }
}
