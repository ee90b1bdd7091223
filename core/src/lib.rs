//! Synchronous HTTP client with pluggable formats and transports.
//!
//! # Overview
//! Requests and responses are structured messages: headers, cookies, raw
//! content and structured data. A [`Formatter`] turns request data into wire
//! content (JSON, URL-encoded, XML, multipart); a [`Parser`] turns response
//! content back into data, with the format detected from headers or by
//! sniffing the content. The actual exchange is delegated to a
//! [`Transport`]: [`HttpTransport`] talks to the network, [`MockTransport`]
//! replays queued responses in tests.
//!
//! # Design
//! - [`Client`] is the factory and orchestrator. It owns configuration, the
//!   transport and the format registries, and is cheap to clone.
//! - Requests are serialized lazily by `prepare()`, which transports call
//!   right before sending; changing the data afterwards forces a re-format.
//! - Response data, cookies and status are derived on demand from headers
//!   and content.
//! - Structured data is a `serde_json::Value`, with mapping keys kept in
//!   insertion order.

pub mod client;
pub mod cookie;
pub mod encoding;
pub mod error;
pub mod format;
pub mod headers;
pub mod http;
pub mod message;
pub mod mime;
pub mod multipart;
pub mod options;
pub mod request;
pub mod response;
pub mod transport;
pub mod url;

pub use client::{Client, ClientBuilder, ClientConfig, Payload};
pub use cookie::{Cookie, CookieCollection};
pub use error::{ClientError, Result};
pub use format::{Formatter, Parser};
pub use headers::Headers;
pub use http::HttpMethod;
pub use message::{HttpMessage, Message};
pub use multipart::PartOptions;
pub use options::Options;
pub use request::Request;
pub use response::Response;
pub use transport::{HttpTransport, MockTransport, Transport};
pub use url::Url;
