//! Fixed-width hexadecimal tokens
//!
//! A token is the two's-complement bit pattern of one value, masked to the
//! interface width and printed as `ceil(bits / 4)` lowercase hex digits.
//! Decoding sign-extends from the interface width.

use crate::error::{Result, TileError};
use crate::tensor::Element;
use bytes::BytesMut;
use std::fmt::Write as _;

/// What to do with a value that does not fit the interface width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// Refuse to encode it
    #[default]
    Reject,
    /// Keep the low `bits` bits
    Truncate,
}

/// Token width and overflow policy for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFormat {
    bits: u32,
    overflow: Overflow,
}

impl TokenFormat {
    /// Format with an explicit interface width in bits (1..=64)
    ///
    /// # Errors
    ///
    /// Returns error if `bits` is outside 1..=64.
    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > 64 {
            return Err(TileError::invalid_config(format!(
                "token width must be 1..=64 bits, got {bits}"
            )));
        }
        Ok(Self {
            bits,
            overflow: Overflow::Reject,
        })
    }

    /// Lossless format for `T` (4 digits for `i16`, 8 for `i32`)
    pub const fn native<T: Element>() -> Self {
        Self {
            bits: T::BITS,
            overflow: Overflow::Reject,
        }
    }

    /// Same width, keeping only the low bits of out-of-range values
    #[must_use]
    pub const fn truncating(mut self) -> Self {
        self.overflow = Overflow::Truncate;
        self
    }

    /// Interface width in bits
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Overflow policy
    pub const fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Hex digits per token
    pub const fn digits(&self) -> usize {
        self.bits.div_ceil(4) as usize
    }

    const fn mask(&self) -> u64 {
        if self.bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    fn signed_range(&self) -> (i64, i64) {
        if self.bits == 64 {
            (i64::MIN, i64::MAX)
        } else {
            let half = 1i64 << (self.bits - 1);
            (-half, half - 1)
        }
    }

    /// Append one token and its newline to `out`
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Token`] if the value does not fit and the policy
    /// is [`Overflow::Reject`].
    pub fn encode_into<T: Element>(&self, value: T, out: &mut BytesMut) -> Result<()> {
        let wide = value.to_i64();
        let (min, max) = self.signed_range();
        if self.overflow == Overflow::Reject && !(min..=max).contains(&wide) {
            return Err(TileError::token(
                0,
                format!("value {value} does not fit a {}-bit token", self.bits),
            ));
        }
        #[allow(clippy::cast_sign_loss)]
        let pattern = (wide as u64) & self.mask();
        writeln!(out, "{pattern:0width$x}", width = self.digits())
            .map_err(|_| TileError::token(0, "token buffer write failed"))
    }

    /// Encode one value as a token string (no newline)
    ///
    /// # Errors
    ///
    /// See [`TokenFormat::encode_into`].
    pub fn encode<T: Element>(&self, value: T) -> Result<String> {
        let mut buf = BytesMut::with_capacity(self.digits() + 1);
        self.encode_into(value, &mut buf)?;
        let text = std::str::from_utf8(&buf)
            .map_err(|_| TileError::token(0, "non-UTF-8 token"))?;
        Ok(text.trim_end().to_string())
    }

    /// Parse one token; `line` is used in error messages
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Token`] for empty, over-long or non-hex tokens,
    /// for bits set above the interface width, and for values `T` cannot hold.
    pub fn decode<T: Element>(&self, token: &str, line: usize) -> Result<T> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TileError::token(line, "empty token"));
        }
        if token.len() > self.digits() {
            return Err(TileError::token(
                line,
                format!(
                    "token {token:?} has {} digits, at most {} allowed",
                    token.len(),
                    self.digits()
                ),
            ));
        }
        if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TileError::token(line, format!("token {token:?} is not hex")));
        }
        let raw = u64::from_str_radix(token, 16)
            .map_err(|e| TileError::token(line, format!("token {token:?}: {e}")))?;
        if raw & !self.mask() != 0 {
            return Err(TileError::token(
                line,
                format!("token {token:?} exceeds {} bits", self.bits),
            ));
        }

        let shift = 64 - self.bits;
        #[allow(clippy::cast_possible_wrap)]
        let value = ((raw << shift) as i64) >> shift;

        let half = 1i64 << (T::BITS - 1);
        if !(-half..half).contains(&value) {
            return Err(TileError::token(
                line,
                format!("value {value} does not fit a {}-bit element", T::BITS),
            ));
        }
        #[allow(clippy::cast_sign_loss)]
        Ok(T::from_bits(value as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits() {
        assert_eq!(TokenFormat::native::<i16>().digits(), 4);
        assert_eq!(TokenFormat::native::<i32>().digits(), 8);
        assert_eq!(TokenFormat::new(8).unwrap().digits(), 2);
        assert_eq!(TokenFormat::new(10).unwrap().digits(), 3);
        assert!(TokenFormat::new(0).is_err());
        assert!(TokenFormat::new(65).is_err());
    }

    #[test]
    fn test_encode_pads_and_masks() {
        let byte = TokenFormat::new(8).unwrap();
        assert_eq!(byte.encode(5i16).unwrap(), "05");
        assert_eq!(byte.encode(-1i16).unwrap(), "ff");
        assert_eq!(byte.encode(-128i16).unwrap(), "80");
        assert_eq!(TokenFormat::native::<i32>().encode(-2i32).unwrap(), "fffffffe");
    }

    #[test]
    fn test_reject_and_truncate() {
        let byte = TokenFormat::new(8).unwrap();
        assert!(byte.encode(200i16).is_err());
        assert_eq!(byte.truncating().encode(200i16).unwrap(), "c8");

        let half = TokenFormat::new(16).unwrap().truncating();
        assert_eq!(half.encode(0x1_2345i32).unwrap(), "2345");
    }

    #[test]
    fn test_decode_sign_extends() {
        let byte = TokenFormat::new(8).unwrap();
        assert_eq!(byte.decode::<i16>("ff", 1).unwrap(), -1);
        assert_eq!(byte.decode::<i16>("7F", 1).unwrap(), 127);
        assert_eq!(byte.decode::<i16>(" 80 ", 1).unwrap(), -128);
        let ten = TokenFormat::new(10).unwrap();
        assert_eq!(ten.decode::<i16>("3ff", 1).unwrap(), -1);
    }

    #[test]
    fn test_decode_errors() {
        let byte = TokenFormat::new(8).unwrap();
        assert!(byte.decode::<i16>("", 3).is_err());
        assert!(byte.decode::<i16>("100", 3).is_err());
        assert!(byte.decode::<i16>("+f", 3).is_err());
        assert!(byte.decode::<i16>("zz", 3).is_err());
        let ten = TokenFormat::new(10).unwrap();
        assert!(ten.decode::<i16>("400", 7).is_err());

        let wide = TokenFormat::native::<i32>();
        let err = wide.decode::<i16>("00010000", 9).unwrap_err();
        assert!(matches!(err, TileError::Token { line: 9, .. }));
    }
}
