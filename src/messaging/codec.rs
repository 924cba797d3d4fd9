//! # Message Codecs
//!
//! Converts typed payloads to and from the text bodies carried by the queue
//! transport. Every call produces a typed result for one item, so callers can
//! drop a malformed payload without affecting its siblings.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::{MessagingError, MessagingResult};

/// Serialization contract between a payload type and the transport encoding
///
/// JSON is the only encoding in use, but queue handles and senders only see
/// this trait so a queue can swap encodings without touching call sites.
pub trait MessageCodec<T>: Send + Sync + 'static {
    /// Encode one payload into a message body
    fn encode(&self, message: &T) -> MessagingResult<String>;

    /// Decode one message body into a payload
    fn decode(&self, body: &str) -> MessagingResult<T>;
}

/// serde_json codec for any serde-compatible payload
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn encode(&self, message: &T) -> MessagingResult<String> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode(&self, body: &str) -> MessagingResult<T> {
        serde_json::from_str(body)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde::{Deserialize, Serializer};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestMessage {
        id: u64,
        data: String,
    }

    #[test]
    fn test_json_codec_roundtrip() {
        let codec = JsonCodec::<TestMessage>::new();
        let msg = TestMessage {
            id: 42,
            data: "hello".to_string(),
        };

        let body = codec.encode(&msg).expect("serialization should succeed");
        assert_eq!(body, r#"{"id":42,"data":"hello"}"#);
        assert_eq!(codec.decode(&body).expect("decode"), msg);
    }

    #[test]
    fn test_json_codec_invalid_body() {
        let codec = JsonCodec::<TestMessage>::new();
        let result = codec.decode("not valid json");
        assert!(matches!(
            result,
            Err(MessagingError::MessageDeserialization { .. })
        ));
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    impl<'de> Deserialize<'de> for Unserializable {
        fn deserialize<D: serde::Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
            Ok(Unserializable)
        }
    }

    #[test]
    fn test_json_codec_serialization_failure() {
        let codec = JsonCodec::<Unserializable>::new();
        let result = codec.encode(&Unserializable);
        assert!(matches!(
            result,
            Err(MessagingError::MessageSerialization { .. })
        ));
    }
}
