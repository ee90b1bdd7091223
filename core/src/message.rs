//! State shared by requests and responses.
//!
//! # Design
//! `Message` is plain data: headers, cookies, an optional format tag, raw
//! content and structured data. `Request` and `Response` embed one and
//! implement [`HttpMessage`], which supplies the common accessors on top of
//! `message()`/`message_mut()`. Implementors override the provided methods
//! where their invariants differ (a request drops stale content when its
//! data changes; a response drops its parse caches on any mutation).
//!
//! Content and data are coupled but not synchronised: content is derived
//! from data when a request is formatted, data is derived from content when
//! a response is parsed, and both may be cached at the same time.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

use crate::cookie::{Cookie, CookieCollection};
use crate::error::{ClientError, Result};
use crate::headers::Headers;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub(crate) headers: Headers,
    pub(crate) cookies: CookieCollection,
    pub(crate) format: Option<String>,
    pub(crate) content: Option<Vec<u8>>,
    pub(crate) data: Option<Value>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Merge `data` into the existing data.
    ///
    /// Missing, `null` or empty existing data is simply replaced. Otherwise
    /// both sides must be mappings; keys from `data` win.
    pub(crate) fn merge_data(&mut self, data: Value) -> Result<()> {
        match self.data.take() {
            None | Some(Value::Null) => self.data = Some(data),
            Some(existing) if is_empty_value(&existing) => self.data = Some(data),
            Some(Value::Object(mut existing)) => {
                let merged = match data {
                    Value::Object(extra) => {
                        existing.extend(extra);
                        Ok(())
                    }
                    _ => Err(ClientError::DataNotMergeable),
                };
                self.data = Some(Value::Object(existing));
                return merged;
            }
            Some(other) => {
                self.data = Some(other);
                return Err(ClientError::DataNotMergeable);
            }
        }
        Ok(())
    }
}

/// Accessors shared by [`Message`], `Request` and `Response`.
pub trait HttpMessage {
    fn message(&self) -> &Message;

    fn message_mut(&mut self) -> &mut Message;

    fn headers(&self) -> &Headers {
        &self.message().headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.message_mut().headers
    }

    fn has_headers(&self) -> bool {
        !self.message().headers.is_empty()
    }

    /// Replace all headers.
    fn set_headers(&mut self, headers: Headers) -> &mut Self {
        self.message_mut().headers = headers;
        self
    }

    /// Append headers, keeping the ones already present.
    fn add_headers(&mut self, headers: Headers) -> &mut Self {
        self.message_mut().headers.merge(headers);
        self
    }

    /// Replace all headers with parsed raw lines (status line included).
    fn set_raw_headers<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        Self: Sized,
    {
        self.set_headers(Headers::from_raw_lines(lines))
    }

    fn cookies(&self) -> &CookieCollection {
        &self.message().cookies
    }

    fn cookies_mut(&mut self) -> &mut CookieCollection {
        &mut self.message_mut().cookies
    }

    fn has_cookies(&self) -> bool {
        !self.cookies().is_empty()
    }

    fn set_cookies<I>(&mut self, cookies: I) -> &mut Self
    where
        I: IntoIterator<Item = Cookie>,
        Self: Sized,
    {
        let message = self.message_mut();
        message.cookies.clear();
        for cookie in cookies {
            message.cookies.add(cookie);
        }
        self
    }

    /// Merge cookies by name; a later cookie replaces an earlier one.
    fn add_cookies<I>(&mut self, cookies: I) -> &mut Self
    where
        I: IntoIterator<Item = Cookie>,
        Self: Sized,
    {
        let message = self.message_mut();
        for cookie in cookies {
            message.cookies.add(cookie);
        }
        self
    }

    fn set_format(&mut self, format: impl Into<String>) -> &mut Self
    where
        Self: Sized,
    {
        self.message_mut().format = Some(format.into());
        self
    }

    fn content(&self) -> Option<&[u8]> {
        self.message().content.as_deref()
    }

    /// Content as text, replacing invalid UTF-8 sequences.
    fn content_str(&self) -> Option<Cow<'_, str>> {
        self.content().map(String::from_utf8_lossy)
    }

    fn set_content(&mut self, content: impl Into<Vec<u8>>) -> &mut Self
    where
        Self: Sized,
    {
        self.message_mut().content = Some(content.into());
        self
    }

    fn clear_content(&mut self) -> &mut Self {
        self.message_mut().content = None;
        self
    }

    fn set_data(&mut self, data: Value) -> &mut Self {
        self.message_mut().data = Some(data);
        self
    }

    fn add_data(&mut self, data: Value) -> Result<&mut Self> {
        self.message_mut().merge_data(data)?;
        Ok(self)
    }

    /// Header lines as they are put on the wire.
    fn compose_header_lines(&self) -> Vec<String> {
        self.message().headers.to_lines()
    }

    /// Headers, a blank line, then the content: the layout of a raw HTTP
    /// message, used for logging.
    fn render_message(&self) -> String {
        let mut result = self.compose_header_lines().join("\n");
        if let Some(content) = self.content_str() {
            if !result.is_empty() {
                result.push_str("\n\n");
            }
            result.push_str(&content);
        }
        result
    }
}

impl HttpMessage for Message {
    fn message(&self) -> &Message {
        self
    }

    fn message_mut(&mut self) -> &mut Message {
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_message())
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn setup_headers() {
        let mut message = Message::new();
        message.set_headers([("header1", "value1"), ("header2", "value2")].into_iter().collect());
        message.add_headers([("header3", "value3")].into_iter().collect());

        let names: Vec<_> = message.headers().iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["header1", "header2", "header3"]);
        assert_eq!(message.headers().get_all("header1"), ["value1"]);
    }

    #[test]
    fn setup_raw_headers() {
        let mut message = Message::new();
        message.set_raw_headers(["header1: value1", "header2: value2"]);
        assert_eq!(message.headers().get("header1"), Some("value1"));
        assert_eq!(message.headers().get("header2"), Some("value2"));
    }

    #[test]
    fn has_headers() {
        let mut message = Message::new();
        assert!(!message.has_headers());
        message.headers_mut().add("name", "value");
        assert!(message.has_headers());
    }

    #[test]
    fn setup_cookies() {
        let mut message = Message::new();
        assert!(!message.has_cookies());

        message.set_cookies([Cookie::new("test", "").with_domain("test.com")]);
        assert_eq!(message.cookies().get("test").unwrap().domain.as_deref(), Some("test.com"));

        message.add_cookies([Cookie::new("additional", "").with_domain("additional.com")]);
        assert_eq!(message.cookies().len(), 2);
        assert_eq!(
            message.cookies().get("additional").unwrap().domain.as_deref(),
            Some("additional.com")
        );
    }

    #[test]
    fn setup_format_and_content() {
        let mut message = Message::new();
        message.set_format("json").set_content("test raw body");
        assert_eq!(message.format(), Some("json"));
        assert_eq!(message.content(), Some(&b"test raw body"[..]));
    }

    #[test]
    fn add_data_merges_mappings() {
        let mut message = Message::new();
        message.set_data(json!({"field1": "value1", "field2": "value2"}));
        message.add_data(json!({"field3": "value3"})).unwrap();
        assert_eq!(
            message.data(),
            Some(&json!({"field1": "value1", "field2": "value2", "field3": "value3"}))
        );
    }

    #[test]
    fn add_data_without_existing_data_sets_it() {
        let mut message = Message::new();
        message.add_data(json!(["array"])).unwrap();
        assert_eq!(message.data(), Some(&json!(["array"])));
    }

    #[test]
    fn unable_to_merge_scalar_data() {
        let mut message = Message::new();
        message.set_data(json!("not an array"));
        let err = message.add_data(json!(["array"])).unwrap_err();
        assert!(matches!(err, ClientError::DataNotMergeable));
        assert_eq!(
            err.to_string(),
            "cannot merge existing data with new data: existing data is not a mapping"
        );
    }

    #[test]
    fn display_content_only() {
        let mut message = Message::new();
        message.set_content("content");
        assert_eq!(message.to_string(), "content");
    }

    #[test]
    fn display_headers_then_content() {
        let mut message = Message::new();
        message.headers_mut().set("content-type", "text/html; charset=UTF-8");
        message.set_content("<html>Content</html>");
        assert_eq!(
            message.to_string(),
            "Content-Type: text/html; charset=UTF-8\n\n<html>Content</html>"
        );
    }
}
