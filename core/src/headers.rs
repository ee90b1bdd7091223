//! Ordered, case-insensitive header multi-map.
//!
//! Names are stored lowercased and keep their first insertion position. Each
//! name maps to an ordered list of values, so a header may repeat (for
//! example `set-cookie`, or `http-code` when the header blocks of several
//! redirect hops are concatenated).

/// Synthetic header carrying the numeric status parsed from a status line.
pub const HTTP_CODE: &str = "http-code";

/// Synthetic header collecting raw lines that are neither a status line nor
/// a `Name: value` pair.
pub const RAW: &str = "raw";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw header lines as received from the wire.
    ///
    /// A status line (`HTTP/1.1 200 OK`) contributes its code to the
    /// synthetic `http-code` header; `Name: value` lines are split on the
    /// first colon; anything else is kept under `raw`.
    pub fn from_raw_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers = Headers::new();
        headers.add_raw_lines(lines);
        headers
    }

    /// Append raw header lines, parsed as in [`Headers::from_raw_lines`].
    pub fn add_raw_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            let line = line.as_ref();
            if let Some(code) = parse_status_line(line) {
                self.add(HTTP_CODE, code);
            } else if let Some((name, value)) = line.split_once(':') {
                self.add(name.trim(), value.trim());
            } else if !line.trim().is_empty() {
                self.add(RAW, line);
            }
        }
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.set_all(name, vec![value.into()])
    }

    /// Replace every value of `name` with `values`.
    pub fn set_all(&mut self, name: &str, values: Vec<String>) -> &mut Self {
        let key = normalize(name);
        match self.position(&key) {
            Some(index) => self.entries[index].1 = values,
            None => self.entries.push((key, values)),
        }
        self
    }

    /// Append `value` to the values of `name`.
    pub fn add(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let key = normalize(name);
        match self.position(&key) {
            Some(index) => self.entries[index].1.push(value.into()),
            None => self.entries.push((key, vec![value.into()])),
        }
        self
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values of `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        let key = normalize(name);
        self.position(&key)
            .map(|index| self.entries[index].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(&normalize(name)).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let index = self.position(&normalize(name))?;
        Some(self.entries.remove(index).1)
    }

    /// Append every value of `other`, keeping names already present in place.
    pub fn merge(&mut self, other: Headers) {
        for (name, values) in other.entries {
            for value in values {
                self.add(&name, value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `Name: value` lines with canonical casing, one line per value.
    pub fn to_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(name, values)| {
                let display = canonical_name(name);
                values
                    .iter()
                    .map(move |value| format!("{display}: {value}"))
            })
            .collect()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == key)
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name.as_ref(), value);
        }
        headers
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// `content-type` -> `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Extract the status code from `HTTP/x.y CODE reason`.
fn parse_status_line(line: &str) -> Option<&str> {
    let prefix = line.get(..5)?;
    if !prefix.eq_ignore_ascii_case("HTTP/") {
        return None;
    }
    let mut tokens = line[5..].split_whitespace();
    let version = tokens.next()?;
    if !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let code = tokens.next()?;
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(code)
}
