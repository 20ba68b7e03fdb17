//! Cell value types
//!
//! Every matrix is generic over a [`CellValue`]. The trait pins down the two
//! things the matrix layer needs beyond `PartialEq`: a comparison under which
//! sentinels such as NaN match themselves, and a hash that agrees with it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{MatrixError, MatrixResult};

/// Trait for types that can be stored in a matrix cell
pub trait CellValue: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Cell identity. Used for missing-value checks, merges and `matrix_equals`.
    fn same_as(&self, other: &Self) -> bool {
        self == other
    }

    /// Feed the value into a hasher consistently with [`CellValue::same_as`]
    fn hash_cell<H: Hasher>(&self, state: &mut H);
}

macro_rules! impl_cell_value_for_hash {
    ($($t:ty),*) => {
        $(
            impl CellValue for $t {
                fn hash_cell<H: Hasher>(&self, state: &mut H) {
                    self.hash(state);
                }
            }
        )*
    };
}

impl_cell_value_for_hash!(u8, u16, u32, u64, i8, i16, i32, i64, usize, bool, char, String);

impl CellValue for f64 {
    fn same_as(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self == other
    }

    fn hash_cell<H: Hasher>(&self, state: &mut H) {
        if self.is_nan() {
            state.write_u64(f64::NAN.to_bits());
        } else if *self == 0.0 {
            // 0.0 and -0.0 compare equal
            state.write_u64(0);
        } else {
            state.write_u64(self.to_bits());
        }
    }
}

impl CellValue for f32 {
    fn same_as(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self == other
    }

    fn hash_cell<H: Hasher>(&self, state: &mut H) {
        if self.is_nan() {
            state.write_u32(f32::NAN.to_bits());
        } else if *self == 0.0 {
            state.write_u32(0);
        } else {
            state.write_u32(self.to_bits());
        }
    }
}

/// Unordered pair of 8-bit symbols, e.g. a diploid genotype call
///
/// The two symbols are always held in non-decreasing order, so `('b','a')`
/// and `('a','b')` are the same pair. `('?','?')` is the conventional missing
/// value; a pair with exactly one `?` is not representable. Tab, newline
/// and carriage return are field separators in every text format and are
/// not valid symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UoPair {
    first: u8,
    second: u8,
}

/// Bytes that delimit cells, keys and lines in the text formats
const SEPARATORS: [u8; 3] = [b'\t', b'\n', b'\r'];

impl UoPair {
    /// The missing pair `('?','?')`
    pub const MISSING: UoPair = UoPair {
        first: b'?',
        second: b'?',
    };

    /// Build a pair from two symbols in any order
    pub fn new(a: u8, b: u8) -> MatrixResult<Self> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self::checked(first, second)
    }

    /// Build a pair from symbols that must already be in non-decreasing order
    pub fn sorted(first: u8, second: u8) -> MatrixResult<Self> {
        if first > second {
            return Err(MatrixError::format(format!(
                "pair '{}{}' is not in sorted order",
                char::from(first),
                char::from(second)
            )));
        }
        Self::checked(first, second)
    }

    /// Build a pair from two characters. Characters must fit in a byte.
    pub fn from_chars(a: char, b: char) -> MatrixResult<Self> {
        let to_byte = |c: char| {
            u8::try_from(u32::from(c))
                .map_err(|_| MatrixError::format(format!("character {:?} does not fit in a byte", c)))
        };
        Self::new(to_byte(a)?, to_byte(b)?)
    }

    fn checked(first: u8, second: u8) -> MatrixResult<Self> {
        if let Some(bad) = [first, second].into_iter().find(|b| SEPARATORS.contains(b)) {
            return Err(MatrixError::format(format!(
                "symbol {:?} is a field separator and cannot appear in a pair",
                char::from(bad)
            )));
        }
        if (first == b'?') != (second == b'?') {
            return Err(MatrixError::format(format!(
                "pair '{}{}' mixes the missing symbol with a value",
                char::from(first),
                char::from(second)
            )));
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> u8 {
        self.first
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    pub fn is_missing(&self) -> bool {
        *self == Self::MISSING
    }

    pub fn is_homozygous(&self) -> bool {
        self.first == self.second
    }

    pub fn as_bytes(&self) -> [u8; 2] {
        [self.first, self.second]
    }
}

impl fmt::Display for UoPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(self.first), char::from(self.second))
    }
}

impl CellValue for UoPair {
    fn hash_cell<H: Hasher>(&self, state: &mut H) {
        self.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_symbols() {
        let pair = UoPair::new(b'g', b'a').unwrap();
        assert_eq!(pair.first(), b'a');
        assert_eq!(pair.second(), b'g');
        assert_eq!(pair.to_string(), "ag");
    }

    #[test]
    fn test_sorted_rejects_descending() {
        assert!(UoPair::sorted(b'b', b'a').unwrap_err().is_format());
        assert!(UoPair::sorted(b'a', b'b').is_ok());
    }

    #[test]
    fn test_half_missing_is_rejected() {
        assert!(UoPair::new(b'?', b'a').is_err());
        assert!(UoPair::new(b'?', b'?').unwrap().is_missing());
    }

    #[test]
    fn test_separator_symbols_are_rejected() {
        assert!(UoPair::new(b'\n', b'a').unwrap_err().is_format());
        assert!(UoPair::new(b'a', b'\t').unwrap_err().is_format());
        assert!(UoPair::sorted(b'\r', b'\r').unwrap_err().is_format());
        assert!(UoPair::from_chars('\t', 'x').unwrap_err().is_format());
        assert!(UoPair::new(b' ', b'a').is_ok());
    }

    #[test]
    fn test_from_chars_rejects_wide_characters() {
        assert!(UoPair::from_chars('a', 'ß').is_ok());
        assert!(UoPair::from_chars('a', '中').is_err());
    }

    #[test]
    fn test_nan_matches_nan() {
        assert!(f64::NAN.same_as(&f64::NAN));
        assert!(!f64::NAN.same_as(&1.0));
        assert!(0.0f64.same_as(&-0.0));
    }
}
