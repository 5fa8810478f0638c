//! YAML backend.

use courier_core::{Codec, ContentType, Error, Result, TypeDescriptor, Value};

/// YAML documents, via `serde_yaml`.
///
/// Mappings must have string keys to fit the codec value tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn media_type(&self) -> &'static str {
        ContentType::Yaml.as_str()
    }

    fn decode(&self, ty: &TypeDescriptor, text: &str) -> Result<Value> {
        serde_yaml::from_str(text).map_err(|e| Error::decode(ty.name(), "", e.to_string()))
    }

    fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<String> {
        serde_yaml::to_string(value).map_err(|e| Error::encode(ty.name(), e.to_string()))
    }
}
