//! Outgoing HTTP request.
//!
//! # Design
//! A `Request` accumulates a method, a target URL, transport options and
//! either raw content, structured data or staged multipart parts. Nothing is
//! serialized until [`Request::prepare`] runs, which transports call right
//! before the exchange. Preparation is guarded by a flag so it runs once;
//! changing the data afterwards drops the stale content and clears the flag.
//!
//! A request created by a [`Client`] keeps a handle to it, used to resolve
//! formatters, compose the full URL against the base URL and route
//! [`Request::send`] through the client's transport. An unbound request
//! falls back to the built-in formatters and has no base URL.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::format::{default_formatter, Formatter, FORMAT_URLENCODED};
use crate::http::HttpMethod;
use crate::message::{HttpMessage, Message};
use crate::mime;
use crate::multipart::{self, ContentPart, PartOptions};
use crate::options::{merge_options, Options};
use crate::response::Response;
use crate::url::Url;

/// Callback run before a request is handed to the transport.
pub type BeforeSendHook = Arc<dyn Fn(&Request) + Send + Sync>;

/// Callback run once the response for a request is available.
pub type AfterSendHook = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Request {
    message: Message,
    client: Option<Client>,
    method: HttpMethod,
    url: Url,
    full_url: Option<String>,
    options: Options,
    prepared: bool,
    output_file: Option<PathBuf>,
    /// Staged multipart parts, keyed by unique alias.
    parts: Vec<(String, ContentPart)>,
    /// Alias -> field name of each staged part.
    content_map: HashMap<String, String>,
    start_time: Option<Instant>,
    elapsed: Option<Duration>,
    before_send_hooks: Vec<BeforeSendHook>,
    after_send_hooks: Vec<AfterSendHook>,
}

impl Request {
    /// An unbound `GET` request with no URL.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bound(client: Client) -> Self {
        Self {
            client: Some(client),
            ..Self::default()
        }
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn set_method(&mut self, method: HttpMethod) -> &mut Self {
        self.method = method;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Replace the target URL. Any composed or overridden full URL is dropped.
    pub fn set_url(&mut self, url: impl Into<Url>) -> &mut Self {
        self.url = url.into();
        self.full_url = None;
        self
    }

    /// The absolute URL the request is sent to.
    pub fn full_url(&self) -> Cow<'_, str> {
        match &self.full_url {
            Some(url) => Cow::Borrowed(url),
            None => Cow::Owned(self.compose_full_url()),
        }
    }

    /// Override the full URL; formatters use this to append a query string.
    pub fn set_full_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.full_url = Some(url.into());
        self
    }

    /// Resolve the URL against the client's base URL, ignoring any override.
    pub fn compose_full_url(&self) -> String {
        let base_url = self.client.as_ref().map(Client::base_url).unwrap_or_default();
        self.url.compose(base_url)
    }

    /// Format tag used to serialize data; `urlencoded` unless set.
    pub fn format(&self) -> &str {
        self.message.format().unwrap_or(FORMAT_URLENCODED)
    }

    pub fn data(&self) -> Option<&Value> {
        self.message.data()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn set_options(&mut self, options: Options) -> &mut Self {
        self.options = options;
        self
    }

    /// Merge options into the current ones; nested mappings accumulate.
    pub fn add_options(&mut self, options: Options) -> &mut Self {
        merge_options(&mut self.options, options);
        self
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Stream the response body into `path` instead of keeping it in memory.
    pub fn set_output_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output_file = Some(path.into());
        self
    }

    /// Stage a named multipart part. Any raw content is discarded, since
    /// the body is now assembled from parts.
    pub fn add_content(&mut self, name: &str, content: impl Into<Vec<u8>>, options: PartOptions) -> &mut Self {
        let alias = format!("{name}_{}", Uuid::new_v4().simple());
        self.content_map.insert(alias.clone(), name.to_string());
        self.parts.push((
            alias,
            ContentPart {
                content: content.into(),
                options,
            },
        ));
        self.message.content = None;
        self.invalidate();
        self
    }

    /// Stage a file upload read from `path`.
    ///
    /// The MIME type is guessed from the file when not given, and the file
    /// name defaults to the base name of `path`.
    pub fn add_file(&mut self, name: &str, path: impl AsRef<Path>, mut options: PartOptions) -> Result<&mut Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        if options.mime_type.is_none() {
            options.mime_type = Some(mime::guess(path, &content).to_string());
        }
        if options.file_name.is_none() {
            options.file_name = path.file_name().map(|base| base.to_string_lossy().into_owned());
        }
        Ok(self.add_content(name, content, options))
    }

    /// Stage in-memory bytes as a file upload named `<name>.dat` by default.
    pub fn add_file_content(&mut self, name: &str, content: impl Into<Vec<u8>>, mut options: PartOptions) -> &mut Self {
        if options.mime_type.is_none() {
            options.mime_type = Some(mime::OCTET_STREAM.to_string());
        }
        if options.file_name.is_none() {
            options.file_name = Some(format!("{name}.dat"));
        }
        self.add_content(name, content, options)
    }

    /// Serialize the request for sending. Runs once until invalidated.
    ///
    /// Raw content is left untouched. Staged parts are assembled into a
    /// multipart body; otherwise the data goes through the formatter for
    /// the request's format.
    pub fn prepare(&mut self) -> Result<&mut Self> {
        if self.prepared {
            return Ok(self);
        }
        if self.message.content.is_none() {
            if self.parts.is_empty() {
                let formatter = self.formatter()?;
                formatter.format(self)?;
            } else {
                let parts = self.parts.iter().map(|(alias, part)| {
                    let name = self.content_map.get(alias).unwrap_or(alias);
                    (name.as_str(), part)
                });
                let body = multipart::build(self.message.data(), parts);
                self.message.headers.set("Content-Type", body.content_type());
                self.message.content = Some(body.content);
            }
        }
        self.prepared = true;
        Ok(self)
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Send through the owning client.
    pub fn send(&mut self) -> Result<Response> {
        let client = self.client.clone().ok_or(ClientError::MissingClient)?;
        client.send(self)
    }

    /// Register a callback run by [`Request::before_send`].
    pub fn on_before_send(&mut self, hook: impl Fn(&Request) + Send + Sync + 'static) -> &mut Self {
        self.before_send_hooks.push(Arc::new(hook));
        self
    }

    /// Register a callback run by [`Request::after_send`].
    pub fn on_after_send(&mut self, hook: impl Fn(&Request, &Response) + Send + Sync + 'static) -> &mut Self {
        self.after_send_hooks.push(Arc::new(hook));
        self
    }

    /// Called by transports before the exchange: notifies the client, then
    /// this request's own callbacks, then starts the clock.
    pub fn before_send(&mut self) {
        self.elapsed = None;
        if let Some(client) = &self.client {
            client.before_send(self);
        }
        for hook in &self.before_send_hooks {
            hook(self);
        }
        self.start_time = Some(Instant::now());
    }

    /// Called by transports once the response is built: stops the clock,
    /// then notifies the client and this request's own callbacks.
    pub fn after_send(&mut self, response: &Response) {
        self.elapsed = self.start_time.map(|start| start.elapsed());
        if let Some(client) = &self.client {
            client.after_send(self, response);
        }
        for hook in &self.after_send_hooks {
            hook(self, response);
        }
    }

    /// Seconds between `before_send` and `after_send`, once both have run.
    pub fn response_time(&self) -> Option<f64> {
        self.elapsed.map(|elapsed| elapsed.as_secs_f64())
    }

    /// Prepare the request and render it as a raw HTTP message:
    /// `METHOD URL`, then headers, a blank line and the content.
    pub fn render(&mut self) -> Result<String> {
        self.prepare()?;
        let mut result = format!("{} {}", self.method.as_str().to_ascii_uppercase(), self.full_url());
        let message = self.render_message();
        if !message.is_empty() {
            result.push('\n');
            result.push_str(&message);
        }
        Ok(result)
    }

    fn formatter(&self) -> Result<Arc<dyn Formatter>> {
        let tag = self.format();
        match &self.client {
            Some(client) => client.formatter(tag),
            None => default_formatter(tag).ok_or_else(|| ClientError::UnrecognizedFormat(tag.to_string())),
        }
    }

    /// Structured data changed: serialized content and the composed URL
    /// are stale.
    fn invalidate(&mut self) {
        if self.prepared {
            self.message.content = None;
            self.full_url = None;
            self.prepared = false;
        }
    }
}

impl HttpMessage for Request {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    fn set_data(&mut self, data: Value) -> &mut Self {
        self.message.data = Some(data);
        self.invalidate();
        self
    }

    fn add_data(&mut self, data: Value) -> Result<&mut Self> {
        self.message.merge_data(data)?;
        self.invalidate();
        Ok(self)
    }

    /// Header lines plus a `Cookie` line when cookies are set.
    fn compose_header_lines(&self) -> Vec<String> {
        let mut lines = self.message.headers.to_lines();
        if self.has_cookies() {
            let pairs: Vec<String> = self
                .cookies()
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect();
            lines.push(format!("Cookie: {}", pairs.join(";")));
        }
        lines
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("full_url", &self.full_url)
            .field("message", &self.message)
            .field("options", &self.options)
            .field("prepared", &self.prepared)
            .field("parts", &self.parts.len())
            .field("output_file", &self.output_file)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;

    use super::*;
    use crate::cookie::Cookie;
    use crate::format::FORMAT_JSON;
    use crate::transport::MockTransport;

    fn client(base_url: &str) -> Client {
        Client::builder().base_url(base_url).build()
    }

    #[test]
    fn defaults() {
        let request = Request::new();
        assert_eq!(*request.method(), HttpMethod::Get);
        assert_eq!(request.format(), FORMAT_URLENCODED);
        assert!(!request.is_prepared());
        assert!(request.response_time().is_none());
    }

    #[test]
    fn full_url_joins_base_and_path() {
        let cases = [
            ("http://some-domain.com", Url::from("test/url"), "http://some-domain.com/test/url"),
            ("http://some-domain.com/", Url::from("/test/url"), "http://some-domain.com/test/url"),
            ("http://some-domain.com", Url::from("http://another-domain.com/test"), "http://another-domain.com/test"),
            (
                "http://some-domain.com",
                Url::route("test/url").param("param1", "name1"),
                "http://some-domain.com/test/url?param1=name1",
            ),
            (
                "http://some-domain.com/?base=1",
                Url::params().param("param1", "name1"),
                "http://some-domain.com/?base=1&param1=name1",
            ),
        ];
        for (base, url, expected) in cases {
            let mut request = client(base).create_request();
            request.set_url(url);
            assert_eq!(request.full_url(), expected, "{base}");
        }
    }

    #[test]
    fn set_url_drops_full_url_override() {
        let mut request = Request::new();
        request.set_full_url("http://override.com");
        assert_eq!(request.full_url(), "http://override.com");
        request.set_url("http://example.com");
        assert_eq!(request.full_url(), "http://example.com");
    }

    #[test]
    fn add_options_merges_nested_mappings() {
        let mut request = Request::new();
        request.set_options(json!({"timeout": 10, "stream": {"a": 1}}).as_object().cloned().unwrap());
        request.add_options(json!({"proxy": "tcp://p", "stream": {"b": 2}}).as_object().cloned().unwrap());
        assert_eq!(
            Value::Object(request.options().clone()),
            json!({"timeout": 10, "stream": {"a": 1, "b": 2}, "proxy": "tcp://p"})
        );
    }

    #[test]
    fn prepare_is_idempotent() {
        let mut request = Request::new();
        request
            .set_method(HttpMethod::Post)
            .set_format(FORMAT_JSON)
            .set_data(json!({"name": "value"}));
        let first = request.prepare().unwrap().content().unwrap().to_vec();
        let second = request.prepare().unwrap().content().unwrap().to_vec();
        assert_eq!(first, second);
        assert!(request.is_prepared());
    }

    #[test]
    fn set_data_after_prepare_reformats() {
        let mut request = Request::new();
        request
            .set_method(HttpMethod::Post)
            .set_format(FORMAT_JSON)
            .set_data(json!({"name": "value"}));
        request.prepare().unwrap();

        request.set_data(json!({"name": "other"}));
        assert!(!request.is_prepared());
        assert!(request.content().is_none());
        request.prepare().unwrap();
        assert_eq!(request.content_str().unwrap(), r#"{"name":"other"}"#);
    }

    #[test]
    fn add_data_after_prepare_reformats() {
        let mut request = Request::new();
        request.set_method(HttpMethod::Post).set_data(json!({"a": "1"}));
        request.prepare().unwrap();
        request.add_data(json!({"b": "2"})).unwrap();
        request.prepare().unwrap();
        assert_eq!(request.content_str().unwrap(), "a=1&b=2");
    }

    #[test]
    fn get_data_after_prepare_recomputes_url() {
        let mut request = Request::new();
        request.set_url("http://example.com/").set_data(json!({"q": "1"}));
        request.prepare().unwrap();
        assert_eq!(request.full_url(), "http://example.com/?q=1");

        request.set_data(json!({"q": "2"}));
        request.prepare().unwrap();
        assert_eq!(request.full_url(), "http://example.com/?q=2");
    }

    #[test]
    fn raw_content_is_not_formatted() {
        let mut request = Request::new();
        request.set_method(HttpMethod::Post).set_format(FORMAT_JSON).set_content("raw body");
        request.prepare().unwrap();
        assert_eq!(request.content_str().unwrap(), "raw body");
        assert!(!request.headers().has("content-type"));
    }

    #[test]
    fn unknown_format_fails_prepare() {
        let mut request = Request::new();
        request.set_format("unrecognizedFormat");
        let err = request.prepare().unwrap_err();
        assert!(matches!(err, ClientError::UnrecognizedFormat(tag) if tag == "unrecognizedFormat"));
    }

    #[test]
    fn multipart_keeps_field_names_for_repeated_parts() {
        let mut request = Request::new();
        request
            .set_method(HttpMethod::Post)
            .set_data(json!({"name": "value"}))
            .add_content("file", "first", PartOptions::new())
            .add_file_content("file", "second", PartOptions::new());
        request.prepare().unwrap();

        let content_type = request.headers().get("content-type").unwrap().to_string();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = request.content_str().unwrap().into_owned();
        assert!(body.contains("name=\"name\"\r\n\r\nvalue\r\n"));
        assert!(body.contains("name=\"file\"\r\n\r\nfirst\r\n"));
        assert!(body.contains(
            "name=\"file\"; filename=\"file.dat\"\r\nContent-Type: application/octet-stream\r\n\r\nsecond\r\n"
        ));
        let boundary = content_type.trim_start_matches("multipart/form-data; boundary=");
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn add_content_replaces_raw_content() {
        let mut request = Request::new();
        request.set_method(HttpMethod::Post).set_content("raw");
        request.add_content("part", "body", PartOptions::new());
        request.prepare().unwrap();
        assert!(request.content_str().unwrap().contains("name=\"part\""));
    }

    #[test]
    fn add_file_defaults_name_and_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let mut request = Request::new();
        request.set_method(HttpMethod::Post);
        request.add_file("upload", &path, PartOptions::new()).unwrap();
        request.prepare().unwrap();
        let body = request.content_str().unwrap().into_owned();
        assert!(body.contains("name=\"upload\"; filename=\"notes.txt\"\r\nContent-Type: text/plain\r\n\r\nhello"));
    }

    #[test]
    fn add_file_missing_path_is_io_error() {
        let mut request = Request::new();
        let err = request
            .add_file("upload", "/definitely/not/here.bin", PartOptions::new())
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[test]
    fn cookie_header_is_composed() {
        let mut request = Request::new();
        request.set_cookies([Cookie::new("a", "1"), Cookie::new("b", "2")]);
        request.headers_mut().set("accept", "*/*");
        assert_eq!(request.compose_header_lines(), ["Accept: */*", "Cookie: a=1;b=2"]);
    }

    #[test]
    fn resend_clears_previous_response_time() {
        let transport = Arc::new(MockTransport::new());
        transport.append_response(Response::new());
        transport.append_response(Response::new());
        let client = Client::builder().transport(transport).build();

        let mut request = client.create_request();
        request.send().unwrap();
        assert!(request.response_time().is_some());

        let timed_before_send = Arc::new(AtomicBool::new(true));
        let seen = Arc::clone(&timed_before_send);
        request.on_before_send(move |request| seen.store(request.response_time().is_some(), Ordering::SeqCst));
        request.send().unwrap();

        assert!(!timed_before_send.load(Ordering::SeqCst));
        assert!(request.response_time().is_some());
    }

    #[test]
    fn render_prepares_and_formats() {
        let mut request = Request::new();
        request
            .set_method(HttpMethod::Post)
            .set_url("http://domain.com/test")
            .set_data(json!({"name": "value"}));
        assert_eq!(
            request.render().unwrap(),
            "POST http://domain.com/test\n\
             Content-Type: application/x-www-form-urlencoded; charset=UTF-8\n\n\
             name=value"
        );
    }

    #[test]
    fn send_without_client_fails() {
        let err = Request::new().send().unwrap_err();
        assert!(matches!(err, ClientError::MissingClient));
    }

    #[test]
    fn hooks_run_and_time_is_recorded() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let mut request = Request::new();
        let before = Arc::clone(&calls);
        let after = Arc::clone(&calls);
        request
            .on_before_send(move |_| {
                before.fetch_add(1, Ordering::SeqCst);
            })
            .on_after_send(move |_, _| {
                after.fetch_add(10, Ordering::SeqCst);
            });

        request.before_send();
        request.after_send(&Response::new());
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert!(request.response_time().unwrap() >= 0.0);
    }
}
