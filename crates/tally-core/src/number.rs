//! Lenient number parsing and formatting
//!
//! Expression text, provider values and stack results are all read with the
//! same forgiving rules: leading whitespace is skipped, the longest numeric
//! prefix wins, and trailing garbage is ignored (`"12abc"` reads as `12`).
//! Anything without a numeric prefix is `None`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Parse the longest leading floating point number of `text`.
///
/// Accepts an optional sign, digits with an optional fraction, an optional
/// exponent, and the literal `Infinity`.
///
/// # Example
/// ```rust
/// use tally_core::number::parse_float;
///
/// assert_eq!(parse_float("42"), Some(42.0));
/// assert_eq!(parse_float("  -1.5e2kg"), Some(-150.0));
/// assert_eq!(parse_float(".5"), Some(0.5));
/// assert_eq!(parse_float("abc"), None);
/// ```
pub fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let unsigned = &text[end..];
    if unsigned.starts_with("Infinity") {
        let negative = bytes.first() == Some(&b'-');
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        // A lone "." only counts when it follows or precedes digits
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse().ok()
}

/// Parse leniently, defaulting to `0` when there is no numeric prefix or the
/// result is NaN.
pub fn parse_or_zero(text: &str) -> f64 {
    match parse_float(text) {
        Some(n) if !n.is_nan() => n,
        _ => 0.0,
    }
}

/// Render a number as expression text.
///
/// Integral values print without a fraction, infinities print as
/// `Infinity` / `-Infinity` so the result can be parsed back by
/// [`parse_float`].
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if value == 0.0 {
        // Collapse -0 as well
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

/// Render a number with a fixed count of decimals.
pub fn format_fixed(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", precision, value)
    } else {
        format_number(value)
    }
}

/// Round half towards positive infinity (`2.5 -> 3`, `-2.5 -> -2`).
pub fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// A number that survives a JSON round trip.
///
/// JSON has no NaN or infinities, so non-finite values are written as the
/// strings `"NaN"`, `"Infinity"` and `"-Infinity"` and read back from them.
/// Finite values stay plain JSON numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JsonNumber(pub f64);

impl Serialize for JsonNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            serializer.serialize_str(&format_number(self.0))
        }
    }
}

impl<'de> Deserialize<'de> for JsonNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(JsonNumber(n)),
            Repr::Text(text) if text == "NaN" => Ok(JsonNumber(f64::NAN)),
            Repr::Text(text) => match parse_float(&text) {
                Some(n) if !n.is_finite() => Ok(JsonNumber(n)),
                _ => Err(D::Error::custom(format!("expected a number, got '{text}'"))),
            },
        }
    }
}

/// `serialize_with` helper for `f64` fields
pub mod json {
    use super::JsonNumber;
    use serde::{Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        JsonNumber(*value).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_prefixes() {
        assert_eq!(parse_float("3"), Some(3.0));
        assert_eq!(parse_float("3.25"), Some(3.25));
        assert_eq!(parse_float("-7"), Some(-7.0));
        assert_eq!(parse_float("+7"), Some(7.0));
        assert_eq!(parse_float("12abc"), Some(12.0));
        assert_eq!(parse_float("1e3"), Some(1000.0));
        assert_eq!(parse_float("1e"), Some(1.0));
        assert_eq!(parse_float("5."), Some(5.0));
        assert_eq!(parse_float("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_float("-Infinity"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_parse_float_rejects() {
        assert_eq!(parse_float(""), None);
        assert_eq!(parse_float("   "), None);
        assert_eq!(parse_float("."), None);
        assert_eq!(parse_float("-"), None);
        assert_eq!(parse_float("x12"), None);
        assert_eq!(parse_float("inf"), None);
        assert_eq!(parse_or_zero("nope"), 0.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(parse_float(&format_number(-1.5)), Some(-1.5));
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(2.0, 2), "2.00");
        assert_eq!(format_fixed(1.23456, 3), "1.235");
        assert_eq!(format_fixed(7.0, 0), "7");
    }

    #[test]
    fn test_json_number_non_finite() {
        let values = vec![JsonNumber(1.5), JsonNumber(f64::INFINITY), JsonNumber(f64::NEG_INFINITY)];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1.5,"Infinity","-Infinity"]"#);
        let back: Vec<JsonNumber> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);

        let nan: JsonNumber = serde_json::from_str(r#""NaN""#).unwrap();
        assert!(nan.0.is_nan());
        assert_eq!(serde_json::to_string(&nan).unwrap(), r#""NaN""#);

        assert!(serde_json::from_str::<JsonNumber>(r#""12""#).is_err());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(1.4), 1.0);
    }
}
