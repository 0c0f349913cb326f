//! Value coercion for typed column reads
//!
//! Text is parsed the way the C library parses numbers: leading whitespace is
//! skipped, the longest valid prefix is used, and text without any digits
//! yields zero. Blobs never convert to text or numbers.

use crate::backend::protocol::SqlValue;
use crate::error::{BridgeError, BridgeResult};

pub const BLOB_TO_STRING: &str = "unknown error (code 0): Unable to convert BLOB to string";
pub const BLOB_TO_LONG: &str = "unknown error (code 0): Unable to convert BLOB to long";
pub const BLOB_TO_DOUBLE: &str = "unknown error (code 0): Unable to convert BLOB to double";
pub const NUMBER_TO_BLOB: &str = "unknown error (code 0): Unable to convert number to blob";

/// Storage class of a column value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Null,
    Integer,
    Float,
    String,
    Blob,
}

impl From<&SqlValue> for ColumnType {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => ColumnType::Null,
            SqlValue::Long(_) => ColumnType::Integer,
            SqlValue::Double(_) => ColumnType::Float,
            SqlValue::String(_) => ColumnType::String,
            SqlValue::Blob(_) => ColumnType::Blob,
        }
    }
}

pub fn as_long(value: &SqlValue) -> BridgeResult<i64> {
    match value {
        SqlValue::Null => Ok(0),
        SqlValue::Long(v) => Ok(*v),
        // saturating, NaN becomes 0
        SqlValue::Double(v) => Ok(*v as i64),
        SqlValue::String(s) => Ok(strtol(s)),
        SqlValue::Blob(_) => Err(BridgeError::Coercion(BLOB_TO_LONG)),
    }
}

pub fn as_double(value: &SqlValue) -> BridgeResult<f64> {
    match value {
        SqlValue::Null => Ok(0.0),
        SqlValue::Long(v) => Ok(*v as f64),
        SqlValue::Double(v) => Ok(*v),
        SqlValue::String(s) => Ok(strtod(s)),
        SqlValue::Blob(_) => Err(BridgeError::Coercion(BLOB_TO_DOUBLE)),
    }
}

/// `None` for NULL
pub fn as_string(value: &SqlValue) -> BridgeResult<Option<String>> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Long(v) => Ok(Some(v.to_string())),
        SqlValue::Double(v) => Ok(Some(format_double(*v))),
        SqlValue::String(s) => Ok(Some(s.clone())),
        SqlValue::Blob(_) => Err(BridgeError::Coercion(BLOB_TO_STRING)),
    }
}

/// `None` for NULL; text yields its UTF-8 bytes
pub fn as_blob(value: &SqlValue) -> BridgeResult<Option<Vec<u8>>> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Blob(b) => Ok(Some(b.clone())),
        SqlValue::String(s) => Ok(Some(s.as_bytes().to_vec())),
        SqlValue::Long(_) | SqlValue::Double(_) => Err(BridgeError::Coercion(NUMBER_TO_BLOB)),
    }
}

/// Shortest round-trip rendering; integral values keep a trailing `.0`
pub fn format_double(value: f64) -> String {
    format!("{:?}", value)
}

fn is_c_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Parse an integer prefix with automatic radix detection.
///
/// `0x`/`0X` selects hexadecimal and a leading `0` selects octal. Overflow
/// saturates to `i64::MAX` for either sign.
pub fn strtol(input: &str) -> i64 {
    let bytes = input.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() && is_c_space(bytes[pos]) {
        pos += 1;
    }

    let mut negative = false;
    if let Some(&sign) = bytes.get(pos).filter(|b| matches!(**b, b'+' | b'-')) {
        negative = sign == b'-';
        pos += 1;
    }

    let rest = &bytes[pos..];
    let radix: u32 = if rest.len() > 2
        && rest[0] == b'0'
        && (rest[1] == b'x' || rest[1] == b'X')
        && rest[2].is_ascii_hexdigit()
    {
        pos += 2;
        16
    } else if rest.first() == Some(&b'0') {
        8
    } else {
        10
    };

    let digits_start = pos;
    let mut value: i64 = 0;
    let mut overflowed = false;
    while let Some(digit) = bytes.get(pos).and_then(|b| (*b as char).to_digit(radix)) {
        if !overflowed {
            let next = value.checked_mul(radix as i64).and_then(|v| {
                if negative {
                    v.checked_sub(digit as i64)
                } else {
                    v.checked_add(digit as i64)
                }
            });
            match next {
                Some(v) => value = v,
                None => overflowed = true,
            }
        }
        pos += 1;
    }

    if pos == digits_start {
        return 0;
    }
    if overflowed {
        return i64::MAX;
    }
    value
}

/// Parse a decimal floating-point prefix, including `inf`/`infinity`/`nan`
pub fn strtod(input: &str) -> f64 {
    let bytes = input.as_bytes();
    let mut start = 0;
    while start < bytes.len() && is_c_space(bytes[start]) {
        start += 1;
    }

    let mut end = start;
    let mut negative = false;
    if let Some(&sign) = bytes.get(end).filter(|b| matches!(**b, b'+' | b'-')) {
        negative = sign == b'-';
        end += 1;
    }

    let word = &bytes[end..];
    let starts_with = |prefix: &[u8]| {
        word.len() >= prefix.len() && word[..prefix.len()].eq_ignore_ascii_case(prefix)
    };
    if starts_with(b"inf") {
        return if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    if starts_with(b"nan") {
        return f64::NAN;
    }

    let mut digits = 0;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
        digits += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    // exponent only counts when at least one digit follows
    if let Some(b'e' | b'E') = bytes.get(end) {
        let mut exp_end = end + 1;
        if let Some(b'+' | b'-') = bytes.get(exp_end) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    input[start..end].parse::<f64>().unwrap_or(0.0)
}
