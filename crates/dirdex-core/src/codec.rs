//! Pluggable value codecs.
//!
//! A codec turns a derived value into the bytes persisted in an index
//! record and back. JSON is the default; MessagePack is available when
//! record size matters.

use crate::IndexError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes and decodes persisted values.
pub trait Codec<V>: Send + Sync {
    /// Encode a value into record bytes.
    fn encode(&self, value: &V) -> Result<Vec<u8>, IndexError>;
    /// Decode record bytes back into a value.
    fn decode(&self, bytes: &[u8]) -> Result<V, IndexError>;
}

/// Human-readable JSON codec (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<V: Serialize + DeserializeOwned> Codec<V> for JsonCodec {
    fn encode(&self, value: &V) -> Result<Vec<u8>, IndexError> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, IndexError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact MessagePack codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl<V: Serialize + DeserializeOwned> Codec<V> for MsgpackCodec {
    fn encode(&self, value: &V) -> Result<Vec<u8>, IndexError> {
        Ok(rmp_serde::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, IndexError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        size: u64,
    }

    fn sample() -> Sample {
        Sample {
            name: "file1.txt".to_string(),
            size: 42,
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let codec = JsonCodec;
        let bytes = codec.encode(&sample()).unwrap();
        let decoded: Sample = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let codec = MsgpackCodec;
        let bytes = codec.encode(&sample()).unwrap();
        let decoded: Sample = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_json_decode_garbage_is_serialization_error() {
        let codec = JsonCodec;
        let result: Result<Sample, _> = codec.decode(b"not json at all");
        assert!(matches!(result, Err(IndexError::Serialization(_))));
    }

    #[test]
    fn test_msgpack_smaller_than_json() {
        let json = Codec::<Sample>::encode(&JsonCodec, &sample()).unwrap();
        let msgpack = Codec::<Sample>::encode(&MsgpackCodec, &sample()).unwrap();
        assert!(msgpack.len() < json.len());
    }
}
