//! `application/x-www-form-urlencoded` backend.

use courier_core::{Codec, ContentType, Error, Result, TypeDescriptor, Value};
use serde_json::Map;
use url::form_urlencoded;

/// Flat URL-encoded forms: written with `serde_html_form`, read with
/// `url::form_urlencoded`.
///
/// The format only carries text: decoded values are strings, and a name
/// repeated in the input becomes an array of strings. Target types should
/// use `String` (or `Vec<String>` for repeated names) for their fields.
/// Encoding accepts a flat object; arrays become repeated names and `null`
/// fields are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormCodec;

impl Codec for FormCodec {
    fn media_type(&self) -> &'static str {
        ContentType::FormUrlEncoded.as_str()
    }

    fn decode(&self, _ty: &TypeDescriptor, text: &str) -> Result<Value> {
        let mut fields = Map::new();
        for (name, value) in form_urlencoded::parse(text.trim().as_bytes()).into_owned() {
            match fields.get_mut(&name) {
                None => {
                    fields.insert(name, Value::String(value));
                }
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            }
        }
        Ok(Value::Object(fields))
    }

    fn encode(&self, ty: &TypeDescriptor, value: &Value) -> Result<String> {
        let Value::Object(fields) = value else {
            return Err(Error::encode(ty.name(), "form bodies must be objects"));
        };

        let mut pairs = Vec::with_capacity(fields.len());
        for (name, field) in fields {
            match field {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar(item) {
                            pairs.push((name.as_str(), text));
                        } else if !item.is_null() {
                            return Err(nested(ty, name));
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar(other) {
                        pairs.push((name.as_str(), text));
                    } else if !other.is_null() {
                        return Err(nested(ty, name));
                    }
                }
            }
        }

        serde_html_form::to_string(&pairs).map_err(|e| Error::encode(ty.name(), e.to_string()))
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn nested(ty: &TypeDescriptor, name: &str) -> Error {
    Error::encode(ty.name(), format!("field `{name}` is nested, forms are flat"))
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use courier_core::CodecExt;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Login {
        username: String,
        password: String,
        scopes: Vec<String>,
    }

    #[test]
    fn form_round_trip() {
        let login = Login {
            username: "tom".to_string(),
            password: "p@ss word".to_string(),
            scopes: vec!["read".to_string(), "write".to_string()],
        };

        let text = FormCodec.encode_as(&login).expect("encode");
        check!(text == "username=tom&password=p%40ss+word&scopes=read&scopes=write");

        let back: Login = FormCodec.decode_as(&text).expect("decode");
        check!(back == login);
    }

    #[test]
    fn scalars_are_rendered_as_text() {
        #[derive(Serialize)]
        struct Search<'a> {
            q: &'a str,
            page: u32,
            exact: bool,
            lang: Option<&'a str>,
        }

        let text = FormCodec
            .encode_as(&Search {
                q: "cats",
                page: 2,
                exact: true,
                lang: None,
            })
            .expect("encode");
        check!(text == "q=cats&page=2&exact=true");
    }

    #[test]
    fn nested_objects_are_rejected() {
        let err = FormCodec
            .encode_as(&serde_json::json!({ "user": { "name": "tom" } }))
            .expect_err("nested");
        check!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn non_objects_are_rejected() {
        let err = FormCodec.encode_as(&vec![1, 2]).expect_err("array");
        check!(err.to_string().contains("form bodies must be objects"));
    }
}
