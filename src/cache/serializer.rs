//! Value serialization for the shared cache tier.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Serialization failure.
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize value: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Turns typed values into bytes for the shared tier and back.
pub trait Serializer: Send + Sync + 'static {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializerError>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializerError>;

    /// Whether `bytes` encode an explicit null, which never counts as a
    /// usable cached value.
    fn is_null(&self, _bytes: &[u8]) -> bool {
        false
    }
}

/// JSON serializer backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    /// Write indented JSON.
    pub pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializerError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        bytes.map_err(SerializerError::Serialize)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializerError> {
        serde_json::from_slice(bytes).map_err(SerializerError::Deserialize)
    }

    fn is_null(&self, bytes: &[u8]) -> bool {
        bytes.trim_ascii() == b"null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_serializer_round_trip() {
        let serializer = JsonSerializer::new();
        let bytes = serializer.serialize(&vec![1, 2, 3]).unwrap();

        assert_eq!(bytes, b"[1,2,3]");
        assert_eq!(serializer.deserialize::<Vec<i32>>(&bytes).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_wrong_type_fails_to_deserialize() {
        let serializer = JsonSerializer::new();
        let err = serializer.deserialize::<i32>(b"\"text\"").unwrap_err();

        assert!(matches!(err, SerializerError::Deserialize(_)));
    }

    #[test]
    fn test_null_detection() {
        let serializer = JsonSerializer::new().pretty(true);

        assert!(serializer.is_null(b" null\n"));
        assert!(!serializer.is_null(b"0"));
        assert!(serializer.is_null(&serializer.serialize(&None::<u8>).unwrap()));
    }
}
