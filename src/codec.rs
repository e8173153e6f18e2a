//! Conversion between raw bus frames and the hexadecimal text typed by an operator.
//!
//! [`encode()`] renders bytes as space separated, two digit, upper case hex groups.
//! [`decode()`] accepts the looser forms people actually type: `FD A0 09`,
//! `0xFD,0xA0,0x09` or `FDA009` all produce the same three bytes.

use nom::bytes::complete::take_while_m_n;
use nom::combinator::map_res;
use nom::IResult;
use snafu::{ensure, OptionExt, Snafu};

use std::fmt::Write;

/// Error returned by [`decode()`]. Both variants carry the normalized text.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum DecodeError {
    /// An odd number of hex digits remained after removing separators.
    #[snafu(display("odd number of hex digits in \"{}\"", text))]
    OddLength { text: String },
    /// A character other than a hex digit remained after removing separators.
    #[snafu(display("non-hexadecimal digit in \"{}\"", text))]
    InvalidDigit { text: String },
}

impl DecodeError {
    /// The input after separator removal.
    pub fn text(&self) -> &str {
        match self {
            Self::OddLength { text } | Self::InvalidDigit { text } => text,
        }
    }
}

/// Format `bytes` as `"FD A0 09"`. An empty slice gives an empty string.
pub fn encode(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        // Writing into a String can't fail.
        let _ = write!(text, "{:02X}", byte);
    }
    text
}

/// Strip separators: spaces, then every literal `0x`, then commas.
///
/// Each step runs once over the output of the previous one, so `"0 xFD"`
/// normalizes to `"FD"` while `"0X"` is left untouched.
pub fn normalize(text: &str) -> String {
    text.replace(' ', "").replace("0x", "").replace(',', "")
}

/// Parse operator supplied hex text into a frame.
///
/// # Errors
/// Returns [`DecodeError::OddLength`] if an odd number of characters remain after
/// [`normalize()`], and [`DecodeError::InvalidDigit`] if any of them isn't a hex digit.
/// Nothing is decoded partially.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let normalized = normalize(text);
    ensure!(
        normalized.chars().count() % 2 == 0,
        OddLengthSnafu { text: &normalized }
    );

    let mut frame = Vec::with_capacity(normalized.len() / 2);
    let mut rest = normalized.as_str();
    while !rest.is_empty() {
        let (remaining, byte) = hex_byte(rest)
            .ok()
            .context(InvalidDigitSnafu { text: &normalized })?;
        frame.push(byte);
        rest = remaining;
    }
    Ok(frame)
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |digits: &str| u8::from_str_radix(digits, 16),
    )(input)
}
