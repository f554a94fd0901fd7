use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::error::CoercionFailure;

/// Largest count we hand out; the store keeps counts in a signed 64-bit column.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// A bare decimal such as `2.5` or `12.0`, as left behind by numeric JSON sources.
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\.(\d+)\s*$").expect("decimal pattern compiles"));

/// Convert an extracted count such as `"1,234"` or `" 56 "` to an integer.
///
/// Every non-digit character is treated as a separator and dropped. A value
/// with no digits at all cannot be repaired and is reported as a failure.
/// A bare decimal is read as a number instead: `"12.0"` is 12, while `"2.5"`
/// is not a count and fails. Values too large for the store saturate at
/// [`MAX_COUNT`].
pub fn coerce_count(raw: &str) -> Result<u64, CoercionFailure> {
    if let Some(caps) = DECIMAL.captures(raw) {
        if caps[2].bytes().any(|b| b != b'0') {
            return Err(CoercionFailure::Fractional {
                raw: raw.to_string(),
            });
        }
        return Ok(saturate(&caps[1]));
    }

    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(CoercionFailure::NoDigits {
            raw: raw.to_string(),
        });
    }
    Ok(saturate(&digits))
}

// Only overflow can fail here
fn saturate(digits: &str) -> u64 {
    digits.parse::<u64>().map_or(MAX_COUNT, |n| n.min(MAX_COUNT))
}

/// Same as [`coerce_count`], with an absent field treated as an empty string.
pub fn coerce_optional(raw: Option<&str>) -> Result<u64, CoercionFailure> {
    coerce_count(raw.unwrap_or(""))
}
