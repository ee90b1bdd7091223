use serde_json::Value;

use super::{content_text, Formatter, Parser};
use crate::encoding::{build_query, parse_query, EncodingType};
use crate::error::Result;
use crate::http::HttpMethod;
use crate::message::HttpMessage;
use crate::options::IN_FILE;
use crate::request::Request;
use crate::response::Response;
use crate::url::append_query;

/// Encodes request data as a query string.
///
/// For `GET` the query is appended to the full URL and the body is left
/// alone; every other method carries it as
/// `application/x-www-form-urlencoded` content.
#[derive(Debug, Clone)]
pub struct UrlEncodedFormatter {
    pub encoding: EncodingType,
    /// Appended to the content type as `; charset=...` when set.
    pub charset: Option<String>,
}

impl UrlEncodedFormatter {
    pub fn new(encoding: EncodingType) -> Self {
        Self {
            encoding,
            charset: Some("UTF-8".to_string()),
        }
    }
}

impl Default for UrlEncodedFormatter {
    fn default() -> Self {
        Self::new(EncodingType::Rfc1738)
    }
}

impl Formatter for UrlEncodedFormatter {
    fn format(&self, request: &mut Request) -> Result<()> {
        let content = request
            .data()
            .map(|data| build_query(data, self.encoding))
            .filter(|query| !query.is_empty());

        if *request.method() == HttpMethod::Get {
            if let Some(query) = content {
                let mut url = request.compose_full_url();
                append_query(&mut url, &query);
                request.set_full_url(url);
            }
            return Ok(());
        }

        let content_type = match &self.charset {
            Some(charset) => format!("application/x-www-form-urlencoded; charset={charset}"),
            None => "application/x-www-form-urlencoded".to_string(),
        };
        request.headers_mut().set("Content-Type", content_type);

        match content {
            Some(query) => {
                request.set_content(query);
            }
            None if !request.options().contains_key(IN_FILE) => {
                request.headers_mut().set("Content-Length", "0");
            }
            None => {}
        }
        Ok(())
    }
}

/// Decodes a query string into a flat mapping of strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedParser;

impl Parser for UrlEncodedParser {
    fn parse(&self, response: &Response) -> Result<Value> {
        Ok(Value::Object(parse_query(content_text(response)?)))
    }
}
