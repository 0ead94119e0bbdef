//! Lenient field decoders for the job table's wire format.
//!
//! The service stores records as loosely typed items, so numbers may
//! arrive as JSON numbers or as numeric strings, and absent values may
//! arrive as `null`, `""` or the literal `"None"`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn parse_u32(scalar: Scalar) -> Result<u32, String> {
    match scalar {
        Scalar::Number(n) => {
            if let Some(v) = n.as_u64() {
                return u32::try_from(v).map_err(|_| format!("{v} is out of range"));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= 0.0 && f <= f64::from(u32::MAX) => Ok(f as u32),
                _ => Err(format!("expected a non-negative integer, got {n}")),
            }
        }
        Scalar::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("expected a numeric string, got {s:?}")),
        Scalar::Bool(b) => Err(format!("expected a number, got {b}")),
    }
}

fn is_absent(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == "None"
}

pub(crate) fn u32_from_scalar<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    parse_u32(Scalar::deserialize(deserializer)?).map_err(D::Error::custom)
}

pub(crate) fn opt_u32_from_scalar<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Text(s)) if is_absent(&s) => Ok(None),
        Some(scalar) => parse_u32(scalar).map(Some).map_err(D::Error::custom),
    }
}

pub(crate) fn opt_text_from_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .filter(|s| !is_absent(s)))
}
