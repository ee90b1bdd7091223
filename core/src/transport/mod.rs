//! Byte-level exchange of prepared requests.
//!
//! # Design
//! A transport owns the whole send pipeline for one request:
//! `before_send`, `prepare`, the exchange itself, building the
//! [`Response`] and `after_send`. Implementations are shared behind an
//! `Arc` by every request of a client, so they must be `Send + Sync` and
//! keep no per-request state.
//!
//! Batches are sequential and fail-fast by default: the first error aborts
//! the batch and responses received so far are dropped.

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::MockTransport;

pub trait Transport: Send + Sync {
    /// Send one request and return its response.
    fn send(&self, request: &mut Request) -> Result<Response>;

    /// Send several requests. Responses are returned in request order.
    fn batch_send(&self, requests: &mut [&mut Request]) -> Result<Vec<Response>> {
        requests.iter_mut().map(|request| self.send(request)).collect()
    }
}
