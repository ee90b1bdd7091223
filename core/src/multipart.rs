//! `multipart/form-data` body assembly (RFC 7578).
//!
//! Plain form fields come from the request data (flattened with bracket
//! notation); file and raw parts come from explicitly staged content. The
//! boundary is regenerated until it occurs in none of the assembled parts.

use serde_json::Value;
use uuid::Uuid;

use crate::encoding::{flatten_form_inputs, scalar_to_string};

/// One staged part of a multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPart {
    pub content: Vec<u8>,
    pub options: PartOptions,
}

/// Per-part metadata. `content_type` takes precedence over `mime_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartOptions {
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl PartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// An assembled body together with the boundary that frames it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    pub boundary: String,
    pub content: Vec<u8>,
}

impl MultipartBody {
    /// Value for the `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// Assemble the body from form data and named parts.
pub fn build<'a, I>(data: Option<&Value>, parts: I) -> MultipartBody
where
    I: IntoIterator<Item = (&'a str, &'a ContentPart)>,
{
    build_with(data, parts, random_boundary)
}

pub(crate) fn build_with<'a, I, F>(data: Option<&Value>, parts: I, mut next_boundary: F) -> MultipartBody
where
    I: IntoIterator<Item = (&'a str, &'a ContentPart)>,
    F: FnMut() -> String,
{
    let mut assembled: Vec<Vec<u8>> = Vec::new();

    if let Some(data) = data {
        for (name, value) in flatten_form_inputs(data) {
            let header = format!("Content-Disposition: form-data; name=\"{}\"", escape(&name));
            assembled.push(frame(&[header], scalar_to_string(&value).as_bytes()));
        }
    }

    for (name, part) in parts {
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape(name));
        if let Some(file_name) = &part.options.file_name {
            disposition.push_str(&format!("; filename=\"{}\"", escape(file_name)));
        }
        let mut headers = vec![disposition];
        if let Some(content_type) = part.options.content_type.as_ref().or(part.options.mime_type.as_ref()) {
            headers.push(format!("Content-Type: {content_type}"));
        }
        assembled.push(frame(&headers, &part.content));
    }

    let boundary = loop {
        let candidate = next_boundary();
        if !assembled.iter().any(|part| contains(part, candidate.as_bytes())) {
            break candidate;
        }
    };

    let mut content = Vec::new();
    for part in &assembled {
        content.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        content.extend_from_slice(part);
        content.extend_from_slice(b"\r\n");
    }
    content.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    MultipartBody { boundary, content }
}

/// NUL, `"`, CR and LF are not allowed in names and filenames.
pub fn escape(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\0' | '"' | '\r' | '\n' => '_',
            other => other,
        })
        .collect()
}

fn frame(headers: &[String], body: &[u8]) -> Vec<u8> {
    let mut part = headers.join("\r\n").into_bytes();
    part.extend_from_slice(b"\r\n\r\n");
    part.extend_from_slice(body);
    part
}

fn random_boundary() -> String {
    format!("---------------------{}", Uuid::new_v4().simple())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
