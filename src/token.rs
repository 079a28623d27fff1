//! Input token handling
//!
//! A write carries a fixed-width token `DDDU`: three bytes of signed decimal
//! followed by a unit byte. The unit is read from byte offset [`UNIT_OFFSET`]
//! no matter how many digits precede it, so short values must be padded
//! (`"037C"`, `"+5F"` is *not* accepted as Fahrenheit). This fixed-offset
//! layout is kept for compatibility with existing writers, quirks included.
//!
//! ```
//! use convertdrv::token::{split_unit, parse_value};
//!
//! let (prefix, unit) = split_unit(b"100F");
//! assert_eq!(prefix, b"100");
//! assert_eq!(unit, Some(b'F'));
//! assert_eq!(parse_value(prefix).unwrap(), 100);
//! ```

use crate::error::{DriverError, ParseErrorKind, Result};
use std::num::IntErrorKind;

/// Largest write the device accepts: four token bytes plus a terminator slot
pub const MAX_WRITE_BYTES: usize = 5;

/// Longest text the result buffer can hold
pub const MAX_RESULT_LEN: usize = MAX_WRITE_BYTES - 1;

/// Byte offset of the unit indicator inside a token
pub const UNIT_OFFSET: usize = 3;

/// Bytes of a staged write that take part in parsing.
///
/// At most [`MAX_RESULT_LEN`] bytes are kept and the token ends early at an
/// embedded NUL, the way a C-string copy into the result buffer would. A
/// trailing newline from `echo 100F > /dev/convertdrv` falls off the end.
pub fn extract_token(staged: &[u8]) -> &[u8] {
    let bounded = &staged[..staged.len().min(MAX_RESULT_LEN)];
    match bounded.iter().position(|&b| b == 0) {
        Some(nul) => &bounded[..nul],
        None => bounded,
    }
}

/// Split a token at the fixed unit offset.
///
/// Returns the numeric prefix (everything before [`UNIT_OFFSET`]) and the
/// unit byte, or `None` when the token is too short to have one.
pub fn split_unit(token: &[u8]) -> (&[u8], Option<u8>) {
    if token.len() > UNIT_OFFSET {
        (&token[..UNIT_OFFSET], Some(token[UNIT_OFFSET]))
    } else {
        (token, None)
    }
}

/// The digits of a numeric prefix, without the single trailing newline
/// `echo` leaves on short tokens
pub fn numeric_prefix(prefix: &[u8]) -> &[u8] {
    prefix.strip_suffix(b"\n").unwrap_or(prefix)
}

/// Parse a numeric prefix as a base-10 signed integer.
///
/// Accepts an optional leading `+` or `-` and a single trailing newline.
/// Whitespace, radix prefixes and any other bytes are rejected.
pub fn parse_value(prefix: &[u8]) -> Result<i64> {
    let text = std::str::from_utf8(numeric_prefix(prefix))
        .map_err(|_| DriverError::ParseError(ParseErrorKind::Invalid))?;

    text.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            DriverError::ParseError(ParseErrorKind::Overflow)
        }
        _ => DriverError::ParseError(ParseErrorKind::Invalid),
    })
}

/// Bounded text held in the result buffer (at most [`MAX_RESULT_LEN`] bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ResultText {
    bytes: [u8; MAX_RESULT_LEN],
    len: usize,
}

impl ResultText {
    /// Empty text; reads of an empty result fail
    pub const fn empty() -> Self {
        Self {
            bytes: [0; MAX_RESULT_LEN],
            len: 0,
        }
    }

    /// Copy up to [`MAX_RESULT_LEN`] bytes, silently truncating the rest
    pub fn truncating(src: &[u8]) -> Self {
        let len = src.len().min(MAX_RESULT_LEN);
        let mut bytes = [0; MAX_RESULT_LEN];
        bytes[..len].copy_from_slice(&src[..len]);
        Self { bytes, len }
    }

    /// Copy `src` exactly, or `None` if it does not fit
    pub fn new(src: &[u8]) -> Option<Self> {
        (src.len() <= MAX_RESULT_LEN).then(|| Self::truncating(src))
    }

    /// Decimal rendering of `value`, truncated to the buffer
    pub fn from_value(value: i64) -> Self {
        Self::truncating(value.to_string().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ResultText {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for ResultText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl std::fmt::Debug for ResultText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResultText({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}
