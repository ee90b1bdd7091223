//! Formatters (structured data -> request content) and parsers (response
//! content -> structured data), resolved by format tag.
//!
//! # Design
//! A [`Registry`] holds explicitly registered instances and falls back to a
//! static table of built-in constructors. Whatever is resolved is cached per
//! tag, so every request of a client shares one stateless instance. The
//! default tables are deliberately asymmetric: `curl` has a formatter but no
//! parser.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::encoding::EncodingType;
use crate::error::{ClientError, Result};
use crate::request::Request;
use crate::response::Response;

mod curl;
mod json;
mod urlencoded;
mod xml;

pub use curl::CurlFormatter;
pub use json::{JsonFormatter, JsonParser};
pub use urlencoded::{UrlEncodedFormatter, UrlEncodedParser};
pub use xml::{XmlFormatter, XmlParser};

pub const FORMAT_JSON: &str = "json";
/// Query string with RFC 1738 encoding (`+` for spaces).
pub const FORMAT_URLENCODED: &str = "urlencoded";
/// Query string with RFC 3986 encoding (`%20` for spaces).
pub const FORMAT_RAW_URLENCODED: &str = "raw-urlencoded";
pub const FORMAT_XML: &str = "xml";
pub const FORMAT_CURL: &str = "curl";

/// Turns a request's data into content and headers, mutating it in place.
pub trait Formatter: Send + Sync {
    fn format(&self, request: &mut Request) -> Result<()>;
}

/// Turns a response's content into structured data.
pub trait Parser: Send + Sync {
    fn parse(&self, response: &Response) -> Result<Value>;
}

/// Tag -> instance table with a fallback to built-in defaults.
pub struct Registry<T: ?Sized> {
    entries: RwLock<HashMap<String, Arc<T>>>,
    defaults: fn(&str) -> Option<Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(defaults: fn(&str) -> Option<Arc<T>>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Register (or override) the instance used for `tag`.
    pub fn register(&self, tag: impl Into<String>, instance: Arc<T>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.into(), instance);
    }

    /// Resolve `tag`: registered instance first, then the built-in default.
    pub fn resolve(&self, tag: &str) -> Result<Arc<T>> {
        if let Some(found) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
        {
            return Ok(Arc::clone(found));
        }
        let instance = (self.defaults)(tag).ok_or_else(|| ClientError::UnrecognizedFormat(tag.to_string()))?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(tag.to_string()).or_insert(instance)))
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut tags: Vec<&String> = entries.keys().collect();
        tags.sort();
        f.debug_struct("Registry").field("resolved", &tags).finish()
    }
}

pub type FormatterRegistry = Registry<dyn Formatter>;
pub type ParserRegistry = Registry<dyn Parser>;

/// Built-in formatter for `tag`, if any.
pub fn default_formatter(tag: &str) -> Option<Arc<dyn Formatter>> {
    let formatter: Arc<dyn Formatter> = match tag {
        FORMAT_JSON => Arc::new(JsonFormatter::default()),
        FORMAT_URLENCODED => Arc::new(UrlEncodedFormatter::new(EncodingType::Rfc1738)),
        FORMAT_RAW_URLENCODED => Arc::new(UrlEncodedFormatter::new(EncodingType::Rfc3986)),
        FORMAT_XML => Arc::new(XmlFormatter::default()),
        FORMAT_CURL => Arc::new(CurlFormatter::default()),
        _ => return None,
    };
    Some(formatter)
}

/// Built-in parser for `tag`, if any. There is no `curl` parser.
pub fn default_parser(tag: &str) -> Option<Arc<dyn Parser>> {
    let parser: Arc<dyn Parser> = match tag {
        FORMAT_JSON => Arc::new(JsonParser),
        FORMAT_URLENCODED | FORMAT_RAW_URLENCODED => Arc::new(UrlEncodedParser),
        FORMAT_XML => Arc::new(XmlParser),
        _ => return None,
    };
    Some(parser)
}

/// Content as UTF-8 text, for parsers that work on strings.
pub(crate) fn content_text(response: &Response) -> Result<&str> {
    use crate::message::HttpMessage;

    std::str::from_utf8(response.content().unwrap_or_default())
        .map_err(|e| ClientError::Encoding(e.to_string()))
}
