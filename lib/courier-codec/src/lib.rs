//! Codec backends for courier.
//!
//! Each backend implements [`courier_core::Codec`] and sits behind its own
//! cargo feature:
//!
//! | Codec | Feature | Format |
//! |---|---|---|
//! | [`JsonCodec`] | `json` (default) | compact JSON |
//! | [`PrettyJsonCodec`] | `json` (default) | indented JSON |
//! | [`YamlCodec`] | `yaml` | YAML |
//! | [`FormCodec`] | `form` | `application/x-www-form-urlencoded` |
//!
//! Backends are interchangeable: a client holds one as `Arc<dyn Codec>` and
//! the same typed call decodes whichever format it is bound to.
//!
//! ```
//! use courier_codec::JsonCodec;
//! use courier_core::CodecExt;
//!
//! let numbers: Vec<u32> = JsonCodec.decode_as("[1, 2, 3]").expect("decode");
//! assert_eq!(numbers, vec![1, 2, 3]);
//! ```

#[cfg(feature = "form")]
mod form;
#[cfg(feature = "json")]
mod json;
#[cfg(feature = "yaml")]
mod yaml;

#[cfg(feature = "form")]
pub use form::FormCodec;
#[cfg(feature = "json")]
pub use json::{JsonCodec, PrettyJsonCodec};
#[cfg(feature = "yaml")]
pub use yaml::YamlCodec;
