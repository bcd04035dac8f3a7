//! Leaf-value decoding (spec §6 Decoder interface).
//!
//! The driver only ever assembles raw bytes for a direct child's value;
//! turning those bytes into a caller-facing value is delegated entirely
//! to a [`ValueDecoder`], so callers that want `serde_json::Value`,
//! a typed `serde::Deserialize`, or something else entirely can all use
//! the same driver.

use std::error::Error as StdError;

/// Decodes one complete, self-contained JSON value from raw bytes.
///
/// The bytes handed to [`decode`](ValueDecoder::decode) are always a
/// structurally complete JSON value (object, array, string, number, or
/// keyword); the decoder never sees a partial value.
pub trait ValueDecoder {
    /// The decoded representation this decoder produces.
    type Value;

    /// Decodes `raw` into a [`Self::Value`].
    fn decode(&self, raw: &[u8]) -> Result<Self::Value, Box<dyn StdError + Send + Sync>>;
}

/// The default decoder: hands raw bytes to `serde_json`, producing a
/// `serde_json::Value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonDecoder;

impl ValueDecoder for SerdeJsonDecoder {
    type Value = serde_json::Value;

    fn decode(&self, raw: &[u8]) -> Result<Self::Value, Box<dyn StdError + Send + Sync>> {
        serde_json::from_slice(raw).map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_object() {
        let d = SerdeJsonDecoder;
        let v = d.decode(br#"{"a":1}"#).unwrap();
        assert_eq!(v, serde_json::json!({"a": 1}));
    }

    #[test]
    fn rejects_invalid_bytes() {
        let d = SerdeJsonDecoder;
        assert!(d.decode(b"{not json}").is_err());
    }
}
