//! Query-string encoding shared by URL composition, the URL-encoded codecs
//! and multipart form fields.
//!
//! Nested mappings and lists are flattened into bracket notation
//! (`form[name]=value`, `tags[0]=a`). Scalars are rendered as text: booleans
//! become `1`/`0`, `null` entries are skipped by the query encoder.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Everything except ASCII alphanumerics and `-_.` is escaped (RFC 1738).
const FORM: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// RFC 3986 unreserved characters are kept verbatim.
const UNRESERVED: &AsciiSet = &FORM.remove(b'~');

/// Percent-encoding variant for query strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncodingType {
    /// `application/x-www-form-urlencoded`: spaces become `+`.
    #[default]
    Rfc1738,
    /// Spaces become `%20`, `~` is left alone.
    Rfc3986,
}

impl EncodingType {
    pub fn encode(self, raw: &str) -> String {
        match self {
            EncodingType::Rfc1738 => utf8_percent_encode(raw, FORM).to_string().replace("%20", "+"),
            EncodingType::Rfc3986 => utf8_percent_encode(raw, UNRESERVED).to_string(),
        }
    }
}

/// Build `name1=value1&name2=value2` from structured data.
pub fn build_query(data: &Value, encoding: EncodingType) -> String {
    flatten_form_inputs(data)
        .into_iter()
        .filter_map(|(key, value)| {
            let value = scalar_to_query(&value)?;
            Some(format!("{}={}", encoding.encode(&key), encoding.encode(&value)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a query string into a flat mapping; a repeated key keeps its last value.
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut result = Map::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        if key.is_empty() {
            continue;
        }
        result.insert(key, Value::String(decode_component(value)));
    }
    result
}

/// Flatten nested data into `(key, leaf)` pairs using bracket notation.
///
/// `{"form": {"name": "value"}}` becomes `[("form[name]", "value")]`. A
/// scalar at the top level has no key and yields nothing.
pub fn flatten_form_inputs(data: &Value) -> Vec<(String, Value)> {
    let mut result = Vec::new();
    collect_inputs(data, "", &mut result);
    result
}

fn collect_inputs(value: &Value, base: &str, out: &mut Vec<(String, Value)>) {
    let child_key = |key: &str| {
        if base.is_empty() {
            key.to_string()
        } else {
            format!("{base}[{key}]")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                collect_inputs(value, &child_key(key), out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                collect_inputs(value, &child_key(&index.to_string()), out);
            }
        }
        leaf if !base.is_empty() => out.push((base.to_string(), leaf.clone())),
        _ => {}
    }
}

/// Text form of a leaf value as it appears in a form body. `null` renders empty.
pub fn scalar_to_string(value: &Value) -> String {
    scalar_to_query(value).unwrap_or_default()
}

fn scalar_to_query(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rfc1738_uses_plus_for_spaces() {
        let query = build_query(&json!({"q": "hello world", "x": "a~b"}), EncodingType::Rfc1738);
        assert_eq!(query, "q=hello+world&x=a%7Eb");
    }

    #[test]
    fn rfc3986_percent_encodes_spaces() {
        let query = build_query(&json!({"q": "hello world", "x": "a~b"}), EncodingType::Rfc3986);
        assert_eq!(query, "q=hello%20world&x=a~b");
    }

    #[test]
    fn nested_data_uses_brackets() {
        let query = build_query(
            &json!({"form": {"name": "value"}, "tags": ["a", "b"]}),
            EncodingType::Rfc3986,
        );
        assert_eq!(query, "form%5Bname%5D=value&tags%5B0%5D=a&tags%5B1%5D=b");
    }

    #[test]
    fn scalars_are_rendered_and_nulls_skipped() {
        let query = build_query(
            &json!({"n": 30, "t": true, "f": false, "missing": null}),
            EncodingType::Rfc1738,
        );
        assert_eq!(query, "n=30&t=1&f=0");
    }

    #[test]
    fn parse_decodes_plus_and_percent() {
        let parsed = parse_query("name=John+Smith&city=New%20York&flag");
        assert_eq!(parsed["name"], "John Smith");
        assert_eq!(parsed["city"], "New York");
        assert_eq!(parsed["flag"], "");
    }

    #[test]
    fn parse_keeps_key_order_and_last_duplicate() {
        let parsed = parse_query("b=1&a=2&b=3");
        let keys: Vec<_> = parsed.keys().cloned().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(parsed["b"], "3");
    }

    #[test]
    fn flatten_skips_top_level_scalar() {
        assert!(flatten_form_inputs(&json!("plain")).is_empty());
    }
}
