//! Face rectangles and the base32 token used to name their crops.
//!
//! A region is named by concatenating the decimal digits of `x`, `y`,
//! `width` and `height`, reading the result as one integer and rendering it
//! with the alphabet `0-9A-V`. The concatenation has no separators, so
//! `(1, 23, 4, 5)` and `(12, 3, 4, 5)` share a token. Existing face folders
//! and manifests were produced with this naming, so it is kept as is.

use std::fmt;

use crate::error::{Error, Result};

pub const BASE32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";

/// Face rectangle in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Decimal digits of the four fields, joined without separators.
    pub fn digits(&self) -> String {
        format!("{}{}{}{}", self.x, self.y, self.width, self.height)
    }

    /// Filename token for this region.
    pub fn token(&self) -> String {
        let digits: Vec<u8> = self.digits().bytes().map(|b| b - b'0').collect();
        encode_digits(&digits)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Render a non-negative decimal integer in base32, most significant symbol
/// first. Works on the digit string directly so region concatenations longer
/// than any machine integer still convert exactly.
pub fn encode_number(digits: &str) -> Result<String> {
    let values = digits
        .chars()
        .map(|ch| {
            ch.to_digit(10)
                .map(|d| d as u8)
                .ok_or(Error::InvalidDigit(ch))
        })
        .collect::<Result<Vec<u8>>>()?;
    Ok(encode_digits(&values))
}

/// Base32 rendering of decimal digit values, each in `0..=9`.
fn encode_digits(digits: &[u8]) -> String {
    let mut number: Vec<u8> = digits.iter().copied().skip_while(|&d| d == 0).collect();

    if number.is_empty() {
        return (BASE32_ALPHABET[0] as char).to_string();
    }

    let mut symbols = Vec::new();
    while !number.is_empty() {
        let mut quotient = Vec::with_capacity(number.len());
        let mut remainder: u32 = 0;
        for &digit in &number {
            let acc = remainder * 10 + digit as u32;
            let q = (acc / 32) as u8;
            remainder = acc % 32;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q);
            }
        }
        symbols.push(BASE32_ALPHABET[remainder as usize]);
        number = quotient;
    }

    symbols.reverse();
    String::from_utf8(symbols).unwrap_or_default()
}

/// Inverse of [`encode_number`]: the decimal digit string of a base32 token.
///
/// This recovers the concatenated integer, not the rectangle, since the
/// field widths are not stored.
pub fn decode_number(token: &str) -> Result<String> {
    // little-endian decimal digits
    let mut number: Vec<u8> = vec![0];

    for ch in token.chars() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&sym| sym as char == ch)
            .ok_or(Error::InvalidToken(ch))? as u32;

        let mut carry = value;
        for digit in number.iter_mut() {
            let acc = *digit as u32 * 32 + carry;
            *digit = (acc % 10) as u8;
            carry = acc / 10;
        }
        while carry > 0 {
            number.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while number.len() > 1 && number.last() == Some(&0) {
        number.pop();
    }

    Ok(number.iter().rev().map(|d| (b'0' + d) as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_small_numbers() {
        assert_eq!(encode_number("0").unwrap(), "0");
        assert_eq!(encode_number("31").unwrap(), "V");
        assert_eq!(encode_number("32").unwrap(), "10");
        assert_eq!(encode_number("1024").unwrap(), "100");
        assert_eq!(encode_number("0045").unwrap(), "1D");
    }

    #[test]
    fn test_encode_rejects_non_digits() {
        assert!(matches!(encode_number("12a4"), Err(Error::InvalidDigit('a'))));
        assert!(matches!(encode_number("-5"), Err(Error::InvalidDigit('-'))));
        assert!(matches!(encode_number("1 2"), Err(Error::InvalidDigit(' '))));
    }

    #[test]
    fn test_encode_matches_machine_arithmetic() {
        for n in [1u64, 7, 255, 123_405, 999_999_999, u64::MAX] {
            let mut expected = Vec::new();
            let mut v = n;
            loop {
                expected.push(BASE32_ALPHABET[(v % 32) as usize]);
                v /= 32;
                if v == 0 {
                    break;
                }
            }
            expected.reverse();
            let token = encode_number(&n.to_string()).unwrap();
            assert_eq!(token.as_bytes(), expected.as_slice());
        }
    }

    #[test]
    fn test_decode_round_trip() {
        let samples = [
            "0",
            "5",
            "123405",
            "18446744073709551616",
            "4294967295429496729542949672954294967295",
        ];
        for digits in samples {
            let token = encode_number(digits).unwrap();
            assert_eq!(decode_number(&token).unwrap(), digits);
        }
    }

    #[test]
    fn test_decode_rejects_foreign_symbols() {
        assert!(matches!(decode_number("1W"), Err(Error::InvalidToken('W'))));
        assert!(matches!(decode_number("ab"), Err(Error::InvalidToken('a'))));
    }

    #[test]
    fn test_rect_token_is_deterministic() {
        let rect = Rect::new(12, 3, 40, 50);
        assert_eq!(rect.digits(), "1234050");
        assert_eq!(rect.token(), rect.token());
        assert_eq!(rect.token(), encode_number("1234050").unwrap());
    }

    #[test]
    fn test_concatenation_collision_is_preserved() {
        assert_eq!(Rect::new(1, 23, 4, 5).token(), Rect::new(12, 3, 4, 5).token());
        assert_ne!(Rect::new(10, 20, 30, 40).token(), Rect::new(10, 20, 30, 41).token());
    }
}
