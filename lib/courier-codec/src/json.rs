//! JSON backends.

use courier_core::{Codec, ContentType, Error, Result, TypeDescriptor, Value};

/// Compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn media_type(&self) -> &'static str {
        ContentType::Json.as_str()
    }

    fn decode(&self, ty: &TypeDescriptor, text: &str) -> Result<Value> {
        parse(ty, text)
    }

    fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::encode(ty.name(), e.to_string()))
    }
}

/// JSON indented for humans. Decoding is the same as [`JsonCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJsonCodec;

impl Codec for PrettyJsonCodec {
    fn media_type(&self) -> &'static str {
        ContentType::Json.as_str()
    }

    fn decode(&self, ty: &TypeDescriptor, text: &str) -> Result<Value> {
        parse(ty, text)
    }

    fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<String> {
        serde_json::to_string_pretty(value).map_err(|e| Error::encode(ty.name(), e.to_string()))
    }
}

fn parse(ty: &TypeDescriptor, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| Error::decode(ty.name(), "", e.to_string()))
}
