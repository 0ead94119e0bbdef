//! Response body decoding.
//!
//! The analytics endpoints serialize their payload to a JSON string and
//! then return that string as the body, so a body may be the payload
//! itself or a JSON string wrapping it. Both are accepted.

use mmm_core::error::ClientError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse a body, unwrapping one level of string encoding.
pub fn decode_value(bytes: &[u8]) -> Result<Value, ClientError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::String(inner) => Ok(serde_json::from_str(&inner).unwrap_or(Value::String(inner))),
        other => Ok(other),
    }
}

/// Parse a body into `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ClientError> {
    Ok(serde_json::from_value(decode_value(bytes)?)?)
}
