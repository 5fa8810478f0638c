//! Pluggable serialization contract.
//!
//! A [`Codec`] turns body text into a self-describing value tree and back.
//! The tree is serde's data model as carried by [`serde_json::Value`]; it is
//! format-neutral, a YAML or form codec produces the same tree shape a JSON
//! codec does. Typed conversion happens in [`CodecExt`], which rebuilds the
//! requested type from the tree with path-aware error messages.
//!
//! Codecs never see Rust types directly. Each call carries a
//! [`TypeDescriptor`] naming the type the caller asked for, obtained from a
//! [`TypeTag`] at the call site. This keeps [`Codec`] object safe, so a
//! client can hold any backend as `Arc<dyn Codec>`.
//!
//! # Example
//!
//! ```
//! use courier_core::{Codec, CodecExt, Result, TypeDescriptor, Value};
//!
//! /// Accepts only the literal text `null`.
//! struct NullCodec;
//!
//! impl Codec for NullCodec {
//!     fn media_type(&self) -> &'static str {
//!         "text/plain"
//!     }
//!
//!     fn decode(&self, ty: &TypeDescriptor, text: &str) -> Result<Value> {
//!         match text {
//!             "null" => Ok(Value::Null),
//!             other => Err(courier_core::Error::decode(ty.name(), "", format!("unexpected `{other}`"))),
//!         }
//!     }
//!
//!     fn encode(&self, _ty: &TypeDescriptor, _value: &Value) -> Result<String> {
//!         Ok("null".to_string())
//!     }
//! }
//!
//! let unit: Option<u32> = NullCodec.decode_as("null").expect("decode");
//! assert_eq!(unit, None);
//! ```

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Result};

/// Runtime description of the type a codec is asked to produce or consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    name: &'static str,
}

impl TypeDescriptor {
    /// Descriptor for `T`.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self {
            name: type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Zero-sized, call-site tag for a target type.
///
/// Typed dispatch builds one of these for the requested `T` and hands its
/// [`TypeDescriptor`] to the codec.
pub struct TypeTag<T: ?Sized>(PhantomData<fn() -> T>);

impl<T: ?Sized> TypeTag<T> {
    /// Creates the tag.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    /// Runtime descriptor of `T`.
    #[must_use]
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::of::<T>()
    }
}

impl<T: ?Sized> Clone for TypeTag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for TypeTag<T> {}

impl<T: ?Sized> Default for TypeTag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for TypeTag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag<{}>", type_name::<T>())
    }
}

/// Serialization backend contract.
///
/// Implementations must be stateless from the caller's point of view: the
/// same instance is shared by every client and request that references it.
pub trait Codec: Send + Sync + 'static {
    /// MIME type written as `Content-Type` for encoded bodies.
    fn media_type(&self) -> &'static str;

    /// Parses `text` into a value tree for the type described by `ty`.
    fn decode(&self, ty: &TypeDescriptor, text: &str) -> Result<Value>;

    /// Renders a value tree of the type described by `ty`.
    fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<String>;
}

/// Typed helpers available on every [`Codec`], including `dyn Codec`.
pub trait CodecExt: Codec {
    /// Decodes `text` into `T`.
    fn decode_as<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        decode_tagged(self, TypeTag::<T>::new(), text)
    }

    /// Encodes `value` as text.
    fn encode_as<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let ty = TypeDescriptor::of::<T>();
        let tree = serde_json::to_value(value).map_err(|e| Error::encode(ty.name(), e.to_string()))?;
        self.encode(&ty, &tree)
    }
}

impl<C: Codec + ?Sized> CodecExt for C {}

/// Decodes `text` into the type named by `tag` using `codec`.
///
/// # Errors
///
/// Returns whatever the codec reports for unparsable text, or
/// [`Error::Decode`] with the path of the first mismatching field.
pub fn decode_tagged<T, C>(codec: &C, tag: TypeTag<T>, text: &str) -> Result<T>
where
    T: DeserializeOwned,
    C: Codec + ?Sized,
{
    let ty = tag.descriptor();
    let tree = codec.decode(&ty, text)?;
    serde_path_to_error::deserialize(tree)
        .map_err(|e| Error::decode(ty.name(), e.path().to_string(), e.inner().to_string()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    /// Test codec reading and writing the JSON text form of the value tree.
    struct TreeCodec;

    impl Codec for TreeCodec {
        fn media_type(&self) -> &'static str {
            "application/x-tree"
        }

        fn decode(&self, ty: &TypeDescriptor, text: &str) -> Result<Value> {
            serde_json::from_str(text).map_err(|e| Error::decode(ty.name(), "", e.to_string()))
        }

        fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<String> {
            serde_json::to_string(value).map_err(|e| Error::encode(ty.name(), e.to_string()))
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        address: Address,
    }

    #[test]
    fn descriptor_names_the_type() {
        let tag = TypeTag::<User>::new();
        assert!(tag.descriptor().name().ends_with("User"));
        assert!(format!("{tag:?}").starts_with("TypeTag<"));
    }

    #[test]
    fn decode_as_builds_the_requested_type() {
        let user: User = TreeCodec
            .decode_as(r#"{"name":"Ada","address":{"city":"London"}}"#)
            .expect("decode");
        assert_eq!(user.address.city, "London");
    }

    #[test]
    fn decode_error_carries_type_and_path() {
        let err = TreeCodec
            .decode_as::<User>(r#"{"name":"Ada","address":{}}"#)
            .expect_err("missing city");

        let Error::Decode {
            type_name, path, ..
        } = &err
        else {
            panic!("expected a decode error, got {err:?}");
        };
        assert!(type_name.ends_with("User"));
        assert!(path.contains("address"), "unexpected path {path}");
        assert!(err.to_string().contains("city"));
    }

    #[test]
    fn works_through_a_trait_object() {
        let codec: &dyn Codec = &TreeCodec;
        let text = codec
            .encode_as(&Address {
                city: "Paris".to_string(),
            })
            .expect("encode");
        let back: Address = codec.decode_as(&text).expect("decode");
        assert_eq!(back.city, "Paris");
    }
}
