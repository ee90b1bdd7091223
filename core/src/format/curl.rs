use serde_json::{Map, Value};

use super::{Formatter, UrlEncodedFormatter};
use crate::encoding::{flatten_form_inputs, scalar_to_string, EncodingType};
use crate::error::Result;
use crate::http::HttpMethod;
use crate::options::POST_FIELDS;
use crate::request::Request;

/// Hands form fields to the transport instead of encoding a body.
///
/// `GET` requests are formatted exactly like [`UrlEncodedFormatter`]. For
/// every other method the data is flattened into the `postFields` option
/// and the content is left unset; the transport encodes the fields itself.
#[derive(Debug, Clone, Default)]
pub struct CurlFormatter {
    pub encoding: EncodingType,
}

impl Formatter for CurlFormatter {
    fn format(&self, request: &mut Request) -> Result<()> {
        if *request.method() == HttpMethod::Get {
            return UrlEncodedFormatter::new(self.encoding).format(request);
        }

        let fields: Map<String, Value> = request
            .data()
            .map(flatten_form_inputs)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name, Value::String(scalar_to_string(&value))))
            .collect();
        request.options_mut().insert(POST_FIELDS.to_string(), Value::Object(fields));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::HttpMessage;

    #[test]
    fn post_fields_go_to_options() {
        let mut request = Request::new();
        request
            .set_method(HttpMethod::Post)
            .set_data(json!({"name": "value", "form": {"flag": true}}));

        CurlFormatter::default().format(&mut request).unwrap();
        assert!(request.content().is_none());
        assert_eq!(
            request.options()[POST_FIELDS],
            json!({"name": "value", "form[flag]": "1"})
        );
    }

    #[test]
    fn get_behaves_like_urlencoded() {
        let mut request = Request::new();
        request.set_url("http://example.com/").set_data(json!({"q": "a b"}));

        CurlFormatter::default().format(&mut request).unwrap();
        assert_eq!(request.full_url(), "http://example.com/?q=a+b");
        assert!(!request.options().contains_key(POST_FIELDS));
    }
}
