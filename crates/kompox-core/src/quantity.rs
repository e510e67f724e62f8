//! Byte quantities such as `10Gi` or `500Mi`

use thiserror::Error;

/// Errors produced while parsing a byte quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Empty string
    #[error("quantity must not be empty")]
    Empty,

    /// Not a number followed by an optional unit
    #[error("invalid quantity {0:?}")]
    Invalid(String),

    /// Unit suffix is not supported
    #[error("unknown unit {suffix:?} in quantity {value:?}")]
    UnknownSuffix {
        /// Full input
        value: String,
        /// Offending suffix
        suffix: String,
    },

    /// Negative sizes are meaningless
    #[error("quantity {0:?} must not be negative")]
    Negative(String),

    /// Does not fit in a signed 64-bit byte count
    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),

    /// JSON/YAML value of an unsupported type
    #[error("unsupported size value of type {0}")]
    UnsupportedType(&'static str),
}

/// Multiplier of a unit suffix; binary and decimal SI units are accepted.
fn multiplier(suffix: &str) -> Option<u128> {
    let m = match suffix {
        "" => 1,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        "Pi" => 1 << 50,
        "Ei" => 1 << 60,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "P" => 1_000_000_000_000_000,
        "E" => 1_000_000_000_000_000_000,
        _ => return None,
    };
    Some(m)
}

/// Parse a quantity string into a byte count.
///
/// Fractional values are rounded up to the next whole byte.
///
/// ```rust
/// use kompox_core::quantity::parse_bytes;
///
/// assert_eq!(parse_bytes("10Gi").unwrap(), 10_737_418_240);
/// assert_eq!(parse_bytes("500Mi").unwrap(), 524_288_000);
/// assert_eq!(parse_bytes("1024").unwrap(), 1024);
/// assert!(parse_bytes("large").is_err());
/// ```
pub fn parse_bytes(input: &str) -> Result<i64, QuantityError> {
    let value = input.trim();
    if value.is_empty() {
        return Err(QuantityError::Empty);
    }
    if value.starts_with('-') {
        return Err(QuantityError::Negative(input.to_string()));
    }

    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(split);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && !frac_part.contains('.')
        && (!number.contains('.') || !frac_part.is_empty());
    if !well_formed {
        return Err(QuantityError::Invalid(input.to_string()));
    }

    let multiplier = multiplier(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
        value: input.to_string(),
        suffix: suffix.to_string(),
    })?;

    let out_of_range = || QuantityError::OutOfRange(input.to_string());
    if frac_part.len() > 18 {
        return Err(QuantityError::Invalid(input.to_string()));
    }
    let scale = 10u128.pow(frac_part.len() as u32);
    let int: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| out_of_range())?
    };
    let frac: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| out_of_range())?
    };

    let scaled = int
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac))
        .and_then(|v| v.checked_mul(multiplier))
        .ok_or_else(out_of_range)?;
    let bytes = scaled.div_ceil(scale);

    i64::try_from(bytes).map_err(|_| out_of_range())
}

/// Interpret a decoded `size` value: an integer byte count, a numeric string
/// or a quantity string.
pub fn parse_size(value: &serde_json::Value) -> Result<i64, QuantityError> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i < 0 {
                    return Err(QuantityError::Negative(i.to_string()));
                }
                Ok(i)
            } else if n.as_u64().is_some() {
                Err(QuantityError::OutOfRange(n.to_string()))
            } else {
                Err(QuantityError::UnsupportedType("float"))
            }
        }
        serde_json::Value::String(s) => parse_bytes(s),
        serde_json::Value::Null => Err(QuantityError::UnsupportedType("null")),
        serde_json::Value::Bool(_) => Err(QuantityError::UnsupportedType("bool")),
        serde_json::Value::Array(_) => Err(QuantityError::UnsupportedType("array")),
        serde_json::Value::Object(_) => Err(QuantityError::UnsupportedType("object")),
    }
}
