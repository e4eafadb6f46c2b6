//! Content-type driven payload (de)serialization
//!
//! A [`SerializerRegistry`] maps a content type (plus object metadata) to a
//! [`Serializer`]. Entries are consulted newest first, so registering a
//! custom serializer overrides the built-in JSON, YAML and CBOR handling.
//! Content types nobody claims fall back to raw bytes.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::{Meta, Result, RiakError};

/// Metadata entry that marks an `application/octet-stream` body as natively
/// serialized.
pub const SERIALIZATION_META: &str = "rust-serialization";
pub const CBOR_MARKER: &str = "CBOR";

/// Object data, either a decoded document or the body bytes as stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(Value),
    Raw(Bytes),
}

impl Payload {
    /// Build a structured payload from any serializable value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Payload::Structured(serde_json::to_value(value)?))
    }

    /// Decode into a typed value. Raw payloads are read as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Payload::Structured(value) => Ok(serde_json::from_value(value.clone())?),
            Payload::Raw(bytes) => Ok(serde_json::from_slice(bytes)?),
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Structured(_) => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Raw(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(Bytes::from(bytes))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Raw(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Raw(Bytes::from(text))
    }
}

/// One entry of the content-type dispatch table.
///
/// Raw payloads are always sent as-is; `serialize` only encodes structured
/// values.
pub trait Serializer: Send + Sync {
    fn name(&self) -> &str;

    fn handles(&self, content_type: &str, meta: &Meta) -> bool;

    fn serialize(&self, payload: &Payload) -> Result<Bytes>;

    fn deserialize(&self, body: &Bytes) -> Result<Payload>;
}

/// `*json*` content types.
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn handles(&self, content_type: &str, _meta: &Meta) -> bool {
        media_type(content_type).contains("json")
    }

    fn serialize(&self, payload: &Payload) -> Result<Bytes> {
        match payload {
            Payload::Structured(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Payload::Raw(bytes) => Ok(bytes.clone()),
        }
    }

    fn deserialize(&self, body: &Bytes) -> Result<Payload> {
        Ok(Payload::Structured(serde_json::from_slice(body)?))
    }
}

/// `*yaml*` content types.
pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn name(&self) -> &str {
        "yaml"
    }

    fn handles(&self, content_type: &str, _meta: &Meta) -> bool {
        media_type(content_type).contains("yaml")
    }

    fn serialize(&self, payload: &Payload) -> Result<Bytes> {
        match payload {
            Payload::Structured(value) => Ok(Bytes::from(serde_yaml::to_string(value)?)),
            Payload::Raw(bytes) => Ok(bytes.clone()),
        }
    }

    fn deserialize(&self, body: &Bytes) -> Result<Payload> {
        Ok(Payload::Structured(serde_yaml::from_slice(body)?))
    }
}

/// `application/octet-stream` bodies flagged with
/// `rust-serialization: CBOR` metadata.
pub struct CborSerializer;

impl Serializer for CborSerializer {
    fn name(&self) -> &str {
        "cbor"
    }

    fn handles(&self, content_type: &str, meta: &Meta) -> bool {
        media_type(content_type) == "application/octet-stream"
            && meta
                .get(SERIALIZATION_META)
                .is_some_and(|marker| marker.eq_ignore_ascii_case(CBOR_MARKER))
    }

    fn serialize(&self, payload: &Payload) -> Result<Bytes> {
        match payload {
            Payload::Structured(value) => {
                let mut buf = Vec::new();
                ciborium::ser::into_writer(value, &mut buf)
                    .map_err(|e| RiakError::Cbor(e.to_string()))?;
                Ok(Bytes::from(buf))
            }
            Payload::Raw(bytes) => Ok(bytes.clone()),
        }
    }

    fn deserialize(&self, body: &Bytes) -> Result<Payload> {
        let value: Value = ciborium::de::from_reader(body.as_ref())
            .map_err(|e| RiakError::Cbor(e.to_string()))?;
        Ok(Payload::Structured(value))
    }
}

/// Fallback: bodies pass through untouched.
pub struct RawSerializer;

impl Serializer for RawSerializer {
    fn name(&self) -> &str {
        "raw"
    }

    fn handles(&self, _content_type: &str, _meta: &Meta) -> bool {
        true
    }

    fn serialize(&self, payload: &Payload) -> Result<Bytes> {
        match payload {
            Payload::Raw(bytes) => Ok(bytes.clone()),
            Payload::Structured(Value::String(text)) => Ok(Bytes::from(text.clone())),
            Payload::Structured(value) => Ok(Bytes::from(value.to_string())),
        }
    }

    fn deserialize(&self, body: &Bytes) -> Result<Payload> {
        Ok(Payload::Raw(body.clone()))
    }
}

/// Ordered content-type dispatch table with a raw fallback.
#[derive(Clone)]
pub struct SerializerRegistry {
    entries: Vec<Arc<dyn Serializer>>,
    fallback: Arc<dyn Serializer>,
}

impl SerializerRegistry {
    /// A registry with no entries; everything is treated as raw bytes.
    pub fn empty() -> Self {
        SerializerRegistry {
            entries: Vec::new(),
            fallback: Arc::new(RawSerializer),
        }
    }

    /// Register a serializer ahead of every existing entry.
    pub fn register(&mut self, serializer: impl Serializer + 'static) -> &mut Self {
        self.entries.insert(0, Arc::new(serializer));
        self
    }

    /// Replace the serializer used when no entry matches.
    pub fn set_fallback(&mut self, serializer: impl Serializer + 'static) -> &mut Self {
        self.fallback = Arc::new(serializer);
        self
    }

    pub fn lookup(&self, content_type: &str, meta: &Meta) -> &dyn Serializer {
        self.entries
            .iter()
            .find(|entry| entry.handles(content_type, meta))
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    pub fn serialize(&self, content_type: &str, meta: &Meta, payload: &Payload) -> Result<Bytes> {
        self.lookup(content_type, meta).serialize(payload)
    }

    pub fn deserialize(&self, content_type: &str, meta: &Meta, body: &Bytes) -> Result<Payload> {
        self.lookup(content_type, meta).deserialize(body)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name()).collect()
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        let mut registry = SerializerRegistry::empty();
        registry
            .register(CborSerializer)
            .register(YamlSerializer)
            .register(JsonSerializer);
        registry
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("entries", &self.names())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
