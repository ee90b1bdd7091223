use serde_json::Value;

use super::{content_text, Formatter, Parser};
use crate::error::Result;
use crate::message::HttpMessage;
use crate::request::Request;
use crate::response::Response;

/// Serializes request data as JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    /// Emit indented JSON instead of the compact form.
    pub pretty: bool,
}

impl Formatter for JsonFormatter {
    fn format(&self, request: &mut Request) -> Result<()> {
        request
            .headers_mut()
            .set("Content-Type", "application/json; charset=UTF-8");

        if let Some(data) = request.data() {
            let content = if self.pretty {
                serde_json::to_vec_pretty(data)?
            } else {
                serde_json::to_vec(data)?
            };
            request.set_content(content);
        }
        Ok(())
    }
}

/// Decodes JSON content, keeping object key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, response: &Response) -> Result<Value> {
        Ok(serde_json::from_str(content_text(response)?)?)
    }
}
