//! Client orchestrator: request/response factory, format registry and
//! entry point to the transport.
//!
//! # Design
//! `Client` is a cheap handle (`Arc` inside) so requests and responses can
//! keep a reference to the client that created them. It holds no per-request
//! state: configuration, the transport, the formatter/parser registries and
//! client-wide callbacks are fixed at build time. Registries resolve and
//! cache instances behind a lock, which is the only interior mutability.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::format::{default_formatter, default_parser, Formatter, FormatterRegistry, Parser, ParserRegistry};
use crate::headers::Headers;
use crate::http::HttpMethod;
use crate::message::HttpMessage;
use crate::options::Options;
use crate::request::{AfterSendHook, BeforeSendHook, Request};
use crate::response::Response;
use crate::transport::{HttpTransport, Transport};
use crate::url::Url;

/// Client settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Prefix for relative request URLs.
    pub base_url: String,
    /// Characters of content kept in request log tokens.
    pub content_logging_max_size: usize,
    /// Format given to new requests; `urlencoded` when absent.
    pub request_format: Option<String>,
    /// Format given to new responses; detected when absent.
    pub response_format: Option<String>,
    /// Options given to new requests.
    pub request_options: Options,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            content_logging_max_size: 2000,
            request_format: None,
            response_format: None,
            request_options: Options::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Request body given to the shortcut constructors.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    None,
    /// Structured data, serialized by the request's formatter.
    Data(Value),
    /// Raw content sent as is.
    Content(Vec<u8>),
}

impl From<Value> for Payload {
    /// Mappings and lists become data, strings become content.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::None,
            Value::String(content) => Payload::Content(content.into_bytes()),
            data => Payload::Data(data),
        }
    }
}

impl From<&str> for Payload {
    fn from(content: &str) -> Self {
        Payload::Content(content.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(content: String) -> Self {
        Payload::Content(content.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(content: Vec<u8>) -> Self {
        Payload::Content(content)
    }
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    formatters: FormatterRegistry,
    parsers: ParserRegistry,
    before_send_hooks: Vec<BeforeSendHook>,
    after_send_hooks: Vec<AfterSendHook>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Client with default configuration over [`HttpTransport`].
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Whether both handles refer to the same client.
    pub fn ptr_eq(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Formatter for `tag`; fails with `UnrecognizedFormat` for unknown tags.
    pub fn formatter(&self, tag: &str) -> Result<Arc<dyn Formatter>> {
        self.inner.formatters.resolve(tag)
    }

    /// Parser for `tag`; fails with `UnrecognizedFormat` for unknown tags.
    pub fn parser(&self, tag: &str) -> Result<Arc<dyn Parser>> {
        self.inner.parsers.resolve(tag)
    }

    /// New request bound to this client, with the configured format and options.
    pub fn create_request(&self) -> Request {
        let mut request = Request::bound(self.clone());
        if let Some(format) = &self.inner.config.request_format {
            request.set_format(format.clone());
        }
        if !self.inner.config.request_options.is_empty() {
            request.set_options(self.inner.config.request_options.clone());
        }
        request
    }

    /// New response bound to this client, built from raw header lines.
    pub fn create_response<I, S>(&self, content: Option<Vec<u8>>, header_lines: I) -> Response
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut response = Response::from_parts(content, header_lines);
        response.set_client(self.clone());
        if let Some(format) = &self.inner.config.response_format {
            response.set_format(format.clone());
        }
        response
    }

    pub fn send(&self, request: &mut Request) -> Result<Response> {
        self.inner.transport.send(request)
    }

    /// Send several requests, pairing each response with the caller's key.
    ///
    /// Fails fast: the first error is returned and no partial results are kept.
    pub fn batch_send<'r, K, I>(&self, requests: I) -> Result<Vec<(K, Response)>>
    where
        I: IntoIterator<Item = (K, &'r mut Request)>,
    {
        let (keys, mut requests): (Vec<K>, Vec<&'r mut Request>) = requests.into_iter().unzip();
        let responses = self.inner.transport.batch_send(&mut requests)?;
        if responses.len() != keys.len() {
            return Err(ClientError::BatchSizeMismatch {
                expected: keys.len(),
                actual: responses.len(),
            });
        }
        Ok(keys.into_iter().zip(responses).collect())
    }

    /// Log line describing an outgoing request, with content truncated to
    /// `contentLoggingMaxSize` characters.
    pub fn create_request_log_token(
        &self,
        method: &str,
        url: &str,
        header_lines: &[String],
        content: Option<&[u8]>,
    ) -> String {
        request_log_token(method, url, header_lines, content, self.inner.config.content_logging_max_size)
    }

    /// Runs the client-wide before-send callbacks.
    pub fn before_send(&self, request: &Request) {
        debug!(method = %request.method(), url = %request.full_url(), "before send");
        for hook in &self.inner.before_send_hooks {
            hook(request);
        }
    }

    /// Runs the client-wide after-send callbacks.
    pub fn after_send(&self, request: &Request, response: &Response) {
        debug!(
            method = %request.method(),
            url = %request.full_url(),
            response_time = ?request.response_time(),
            "after send"
        );
        for hook in &self.inner.after_send_hooks {
            hook(request, response);
        }
    }

    pub fn get(&self, url: impl Into<Url>, payload: impl Into<Payload>, headers: Headers, options: Options) -> Request {
        self.shortcut(HttpMethod::Get, url.into(), payload.into(), headers, options)
    }

    pub fn post(&self, url: impl Into<Url>, payload: impl Into<Payload>, headers: Headers, options: Options) -> Request {
        self.shortcut(HttpMethod::Post, url.into(), payload.into(), headers, options)
    }

    pub fn put(&self, url: impl Into<Url>, payload: impl Into<Payload>, headers: Headers, options: Options) -> Request {
        self.shortcut(HttpMethod::Put, url.into(), payload.into(), headers, options)
    }

    pub fn patch(&self, url: impl Into<Url>, payload: impl Into<Payload>, headers: Headers, options: Options) -> Request {
        self.shortcut(HttpMethod::Patch, url.into(), payload.into(), headers, options)
    }

    pub fn delete(&self, url: impl Into<Url>, payload: impl Into<Payload>, headers: Headers, options: Options) -> Request {
        self.shortcut(HttpMethod::Delete, url.into(), payload.into(), headers, options)
    }

    pub fn head(&self, url: impl Into<Url>, headers: Headers, options: Options) -> Request {
        self.shortcut(HttpMethod::Head, url.into(), Payload::None, headers, options)
    }

    pub fn options(&self, url: impl Into<Url>, options: Options) -> Request {
        self.shortcut(HttpMethod::Options, url.into(), Payload::None, Headers::new(), options)
    }

    fn shortcut(&self, method: HttpMethod, url: Url, payload: Payload, headers: Headers, options: Options) -> Request {
        let mut request = self.create_request();
        request
            .set_method(method)
            .set_url(url)
            .add_headers(headers)
            .add_options(options);
        match payload {
            Payload::None => {}
            Payload::Data(data) => {
                request.set_data(data);
            }
            Payload::Content(content) => {
                request.set_content(content);
            }
        }
        request
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("formatters", &self.inner.formatters)
            .field("parsers", &self.inner.parsers)
            .finish_non_exhaustive()
    }
}

/// `METHOD URL`, the header lines, then the content truncated to
/// `max_content` characters (with a trailing `...` when cut).
pub fn request_log_token(
    method: &str,
    url: &str,
    header_lines: &[String],
    content: Option<&[u8]>,
    max_content: usize,
) -> String {
    let mut token = format!("{} {url}", method.to_ascii_uppercase());
    if !header_lines.is_empty() {
        token.push('\n');
        token.push_str(&header_lines.join("\n"));
    }
    if let Some(content) = content {
        let content = String::from_utf8_lossy(content);
        token.push_str("\n\n");
        match content.char_indices().nth(max_content) {
            Some((cut, _)) => {
                token.push_str(&content[..cut]);
                token.push_str("...");
            }
            None => token.push_str(&content),
        }
    }
    token
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    formatters: Vec<(String, Arc<dyn Formatter>)>,
    parsers: Vec<(String, Arc<dyn Parser>)>,
    before_send_hooks: Vec<BeforeSendHook>,
    after_send_hooks: Vec<AfterSendHook>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `formatter` for `tag`, overriding any built-in one.
    pub fn formatter(mut self, tag: impl Into<String>, formatter: impl Formatter + 'static) -> Self {
        self.formatters.push((tag.into(), Arc::new(formatter)));
        self
    }

    /// Use `parser` for `tag`, overriding any built-in one.
    pub fn parser(mut self, tag: impl Into<String>, parser: impl Parser + 'static) -> Self {
        self.parsers.push((tag.into(), Arc::new(parser)));
        self
    }

    pub fn on_before_send(mut self, hook: impl Fn(&Request) + Send + Sync + 'static) -> Self {
        self.before_send_hooks.push(Arc::new(hook));
        self
    }

    pub fn on_after_send(mut self, hook: impl Fn(&Request, &Response) + Send + Sync + 'static) -> Self {
        self.after_send_hooks.push(Arc::new(hook));
        self
    }

    pub fn build(self) -> Client {
        let formatters = FormatterRegistry::new(default_formatter);
        for (tag, formatter) in self.formatters {
            formatters.register(tag, formatter);
        }
        let parsers = ParserRegistry::new(default_parser);
        for (tag, parser) in self.parsers {
            parsers.register(tag, parser);
        }
        Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport: self.transport.unwrap_or_else(|| Arc::new(HttpTransport::new())),
                formatters,
                parsers,
                before_send_hooks: self.before_send_hooks,
                after_send_hooks: self.after_send_hooks,
            }),
        }
    }
}
