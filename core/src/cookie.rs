//! Cookies attached to requests and parsed from `Set-Cookie` response headers.

use percent_encoding::percent_decode_str;

/// A single cookie. Attributes that have no dedicated field are preserved in
/// `attributes` in the order they were seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<String>,
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub attributes: Vec<(String, String)>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parse one `Set-Cookie` header value.
    ///
    /// The first `name=value` pair seeds the cookie; the remaining `;`
    /// separated items populate known attributes. Values are URL-decoded.
    /// Returns `None` when the header does not start with a `name=value` pair.
    pub fn parse_set_cookie(header: &str) -> Option<Cookie> {
        let mut items = header.split(';');
        let (name, value) = items.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, url_decode(value.trim()));

        for item in items {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.split_once('=') {
                None => match item.to_ascii_lowercase().as_str() {
                    "httponly" => cookie.http_only = true,
                    "secure" => cookie.secure = true,
                    _ => cookie.attributes.push((item.to_string(), "true".to_string())),
                },
                Some((key, value)) => {
                    let value = url_decode(value.trim());
                    match key.trim().to_ascii_lowercase().as_str() {
                        "path" => cookie.path = Some(value),
                        "domain" => cookie.domain = Some(value),
                        "expires" => cookie.expires = Some(value),
                        "max-age" => match value.parse() {
                            Ok(seconds) => cookie.max_age = Some(seconds),
                            Err(_) => cookie.attributes.push((key.trim().to_string(), value)),
                        },
                        "httponly" => cookie.http_only = true,
                        "secure" => cookie.secure = true,
                        _ => cookie.attributes.push((key.trim().to_string(), value)),
                    }
                }
            }
        }
        Some(cookie)
    }
}

/// Cookies keyed by name, in insertion order. Adding a cookie whose name is
/// already present replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieCollection {
    cookies: Vec<Cookie>,
}

impl CookieCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Cookie> {
        let index = self.cookies.iter().position(|c| c.name == name)?;
        Some(self.cookies.remove(index))
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl FromIterator<Cookie> for CookieCollection {
    fn from_iter<T: IntoIterator<Item = Cookie>>(iter: T) -> Self {
        let mut collection = CookieCollection::new();
        for cookie in iter {
            collection.add(cookie);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a CookieCollection {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.iter()
    }
}

fn url_decode(value: &str) -> String {
    percent_decode_str(&value.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}
