//! Incoming HTTP response.
//!
//! # Design
//! A `Response` stores only headers and content as received. The status
//! code, cookies and structured data are derived on demand: cookies and
//! data are parsed lazily and cached, and the caches are dropped whenever
//! the underlying message is mutated.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::de::IgnoredAny;
use serde_json::Value;

use crate::client::Client;
use crate::cookie::{Cookie, CookieCollection};
use crate::error::{ClientError, Result};
use crate::format::{default_parser, Parser, FORMAT_JSON, FORMAT_URLENCODED, FORMAT_XML};
use crate::headers::{Headers, HTTP_CODE};
use crate::message::{HttpMessage, Message};

#[derive(Clone, Default)]
pub struct Response {
    message: Message,
    client: Option<Client>,
    parsed_data: OnceLock<Value>,
    parsed_cookies: OnceLock<CookieCollection>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response built from raw header lines and optional content.
    pub fn from_parts<I, S>(content: Option<Vec<u8>>, header_lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut response = Self::new();
        response.message.headers = Headers::from_raw_lines(header_lines);
        response.message.content = content;
        response
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub(crate) fn set_client(&mut self, client: Client) {
        self.client = Some(client);
    }

    /// Explicit format tag if set, otherwise the one detected from headers
    /// and content.
    pub fn format(&self) -> Option<&str> {
        self.message
            .format()
            .or_else(|| detect_format(&self.message.headers, self.message.content.as_deref()))
    }

    /// Structured data: explicitly set data, or the content parsed with the
    /// parser for [`Response::format`]. Content whose format cannot be
    /// determined is returned as a string. `None` when there is no content.
    pub fn data(&self) -> Result<Option<&Value>> {
        if let Some(data) = self.message.data() {
            return Ok(Some(data));
        }
        if let Some(parsed) = self.parsed_data.get() {
            return Ok(Some(parsed));
        }
        let Some(content) = self.message.content.as_deref().filter(|content| !content.is_empty()) else {
            return Ok(None);
        };
        let value = match self.format() {
            Some(tag) => self.parser(tag)?.parse(self)?,
            None => Value::String(String::from_utf8_lossy(content).into_owned()),
        };
        Ok(Some(self.parsed_data.get_or_init(|| value)))
    }

    /// Numeric status from the synthetic `http-code` header. When several
    /// codes are present (one per redirect hop) the first one wins.
    pub fn status_code(&self) -> Result<u16> {
        let raw = self.message.headers.get(HTTP_CODE).ok_or(ClientError::MissingStatusCode)?;
        raw.trim()
            .parse()
            .map_err(|_| ClientError::InvalidStatusCode(raw.to_string()))
    }

    /// Whether the status code is in the 2xx range.
    pub fn is_ok(&self) -> Result<bool> {
        Ok((200..300).contains(&self.status_code()?))
    }

    fn parser(&self, tag: &str) -> Result<Arc<dyn Parser>> {
        match &self.client {
            Some(client) => client.parser(tag),
            None => default_parser(tag).ok_or_else(|| ClientError::UnrecognizedFormat(tag.to_string())),
        }
    }
}

impl HttpMessage for Response {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        self.parsed_data = OnceLock::new();
        self.parsed_cookies = OnceLock::new();
        &mut self.message
    }

    /// Cookies set explicitly, or those parsed from `Set-Cookie` headers.
    fn cookies(&self) -> &CookieCollection {
        if !self.message.cookies.is_empty() {
            return &self.message.cookies;
        }
        self.parsed_cookies.get_or_init(|| parse_cookies(&self.message.headers))
    }

    fn cookies_mut(&mut self) -> &mut CookieCollection {
        if self.message.cookies.is_empty() {
            self.message.cookies = self
                .parsed_cookies
                .take()
                .unwrap_or_else(|| parse_cookies(&self.message.headers));
        }
        &mut self.message.cookies
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_message())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("message", &self.message)
            .field("bound", &self.client.is_some())
            .finish()
    }
}

fn parse_cookies(headers: &Headers) -> CookieCollection {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|header| Cookie::parse_set_cookie(header))
        .collect()
}

/// Detect the format tag of a message.
///
/// The last `Content-Type` value is checked for `json`, `urlencoded` and
/// `xml`, in that order. Without a match the content is sniffed: a JSON
/// object or array, an XML declaration, or a `key=value&...` query string.
/// HTML is never reported as XML.
pub fn detect_format(headers: &Headers, content: Option<&[u8]>) -> Option<&'static str> {
    if let Some(content_type) = headers.get_all("content-type").last() {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("json") {
            return Some(FORMAT_JSON);
        }
        if content_type.contains("urlencoded") {
            return Some(FORMAT_URLENCODED);
        }
        if content_type.contains("xml") {
            return Some(FORMAT_XML);
        }
    }

    let content = std::str::from_utf8(content?).ok()?.trim();
    if (content.starts_with('{') || content.starts_with('['))
        && serde_json::from_str::<IgnoredAny>(content).is_ok()
    {
        return Some(FORMAT_JSON);
    }
    if is_html(content) {
        return None;
    }
    if content.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("<?xml")) {
        return Some(FORMAT_XML);
    }
    if is_query_string(content) {
        return Some(FORMAT_URLENCODED);
    }
    None
}

fn is_html(content: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    lower.contains("<!doctype html") || lower.contains("<html")
}

/// `k=v` pairs joined by `&`, with no further `=` or `&` inside a pair.
fn is_query_string(content: &str) -> bool {
    !content.is_empty()
        && !content.contains(char::is_whitespace)
        && content.split('&').all(|pair| match pair.split_once('=') {
            Some((key, value)) => !key.is_empty() && !value.is_empty() && !value.contains('='),
            None => false,
        })
}
