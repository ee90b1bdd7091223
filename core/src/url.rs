//! Request target: a literal URL or a route with query parameters, and its
//! composition against the client's base URL.

use serde_json::{Map, Value};

use crate::encoding::{build_query, EncodingType};

/// Target URL of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Url {
    /// Used verbatim, subject to base URL composition.
    Literal(String),
    /// A path (possibly absent) plus query parameters appended on composition.
    Route {
        path: Option<String>,
        params: Map<String, Value>,
    },
}

impl Url {
    /// Route form with a path and no parameters yet.
    pub fn route(path: impl Into<String>) -> Self {
        Url::Route {
            path: Some(path.into()),
            params: Map::new(),
        }
    }

    /// Route form without a path; only the parameters are appended to the base URL.
    pub fn params() -> Self {
        Url::Route {
            path: None,
            params: Map::new(),
        }
    }

    /// Add a query parameter. A literal URL is turned into a route first.
    pub fn param(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let (path, mut params) = match self {
            Url::Literal(path) => (Some(path), Map::new()),
            Url::Route { path, params } => (path, params),
        };
        params.insert(name.into(), value.into());
        Url::Route { path, params }
    }

    /// Resolve against `base_url`.
    ///
    /// An empty path yields the base URL itself, a relative path is joined
    /// to the base with exactly one slash, and an absolute `http(s)://` path
    /// ignores the base. Remaining parameters are appended with `?` or `&`.
    pub fn compose(&self, base_url: &str) -> String {
        let (path, params) = match self {
            Url::Literal(path) => (path.as_str(), None),
            Url::Route { path, params } => (path.as_deref().unwrap_or(""), Some(params)),
        };

        let mut url = if base_url.is_empty() {
            path.to_string()
        } else if path.is_empty() {
            base_url.to_string()
        } else if is_absolute(path) {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };

        if let Some(params) = params.filter(|params| !params.is_empty()) {
            let query = build_query(&Value::Object(params.clone()), EncodingType::Rfc1738);
            append_query(&mut url, &query);
        }
        url
    }
}

impl Default for Url {
    fn default() -> Self {
        Url::Literal(String::new())
    }
}

impl From<&str> for Url {
    fn from(value: &str) -> Self {
        Url::Literal(value.to_string())
    }
}

impl From<String> for Url {
    fn from(value: String) -> Self {
        Url::Literal(value)
    }
}

/// Append `query` to `url`, choosing `?` or `&` depending on whether a
/// query is already present. An empty query leaves the URL untouched.
pub fn append_query(url: &mut String, query: &str) {
    if query.is_empty() {
        return;
    }
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(query);
}

fn is_absolute(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
