//! Lenient deserializers for identifiers the upstream API sends as either
//! strings or numbers

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

/// `"42"`, `42` and `42.0` all become `"42"`
pub fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
        StringOrNumber::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
        StringOrNumber::Float(f) => f.to_string(),
    })
}

/// Numeric user ids; blank or non-numeric strings become `None`
pub fn opt_numeric_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let raw: Option<StringOrNumber> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(StringOrNumber::Str(s)) => s.trim().parse().ok(),
        Some(StringOrNumber::Int(i)) => Some(i),
        Some(StringOrNumber::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        _ => None,
    })
}

/// Strings that may arrive as `null`
pub fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
