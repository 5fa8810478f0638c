//! Multipart form bodies.
//!
//! A [`Form`] is what a `POST`, `PUT` or `PATCH` request carries when no
//! explicit body was set: every field and file added through the request
//! builder becomes a [`Part`]. A form with no parts still renders its
//! closing boundary, so such requests always have a body.
//!
//! ```
//! use courier_core::{Form, Part};
//!
//! let form = Form::with_boundary("xyz")
//!     .field("name", "Tom")
//!     .part(Part::file("avatar", "tom.png", vec![0x89, 0x50]));
//!
//! assert_eq!(form.len(), 2);
//! assert_eq!(form.content_type(), "multipart/form-data; boundary=xyz");
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

/// One named part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Creates a part with neither file name nor content type.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Creates a plain form field.
    #[must_use]
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value.into())
    }

    /// Creates a file part, guessing the content type from the file extension.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let file_name = file_name.into();
        let content_type = guess_media_type(&file_name);
        Self {
            name: name.into(),
            file_name: Some(file_name),
            content_type: Some(content_type.to_string()),
            data: data.into(),
        }
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name, for file parts.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw content.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }
}

fn guess_media_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "xml" => "application/xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// A `multipart/form-data` body under construction.
#[derive(Debug, Clone)]
pub struct Form {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// Creates an empty form with a fresh boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Creates an empty form with a fixed boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Adds a part.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.push(part);
        self
    }

    /// Adds a plain field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(Part::field(name, value))
    }

    /// Adds a file with an explicit media type.
    #[must_use]
    pub fn file(
        self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
        media_type: impl Into<String>,
    ) -> Self {
        self.part(Part::file(name, file_name, data).with_content_type(media_type))
    }

    /// Adds a part in place.
    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Boundary delimiting the parts.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Parts in insertion order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if the form has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// `Content-Type` header value for this form.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Renders the body.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
            buf.put_slice(part.name.as_bytes());
            buf.put_u8(b'"');
            if let Some(file_name) = &part.file_name {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(file_name.as_bytes());
                buf.put_u8(b'"');
            }
            buf.put_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(b"\r\n");
            }
            buf.put_slice(b"Content-Length: ");
            buf.put_slice(part.data.len().to_string().as_bytes());
            buf.put_slice(b"\r\n\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        buf.freeze()
    }

    /// Consumes the form into `(content type, body)`.
    #[must_use]
    pub fn into_body(self) -> (String, Bytes) {
        (self.content_type(), self.encode())
    }
}

fn generate_boundary() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("----CourierBoundary{nanos:x}{sequence:04x}")
}
