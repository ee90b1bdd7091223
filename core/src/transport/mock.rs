use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::Transport;
use crate::error::{ClientError, Result};
use crate::request::Request;
use crate::response::Response;

/// In-memory transport for tests.
///
/// Responses are queued up front with [`MockTransport::append_response`]
/// and handed out in FIFO order; every sent request is recorded and can be
/// drained with [`MockTransport::flush_requests`].
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Response>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a later `send`.
    pub fn append_response(&self, response: Response) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Take every request sent so far, oldest first.
    pub fn flush_requests(&self) -> Vec<Request> {
        std::mem::take(&mut *self.requests.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn next_response(&self) -> Result<Response> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(ClientError::NoResponseAvailable)
    }

    fn has_responses(&self) -> bool {
        !self.responses.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &mut Request) -> Result<Response> {
        if !self.has_responses() {
            return Err(ClientError::NoResponseAvailable);
        }

        request.before_send();
        request.prepare()?;

        let mut response = self.next_response()?;
        if response.client().is_none() {
            if let Some(client) = request.client() {
                response.set_client(client.clone());
            }
        }
        debug!(method = %request.method(), url = %request.full_url(), "mock exchange");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        request.after_send(&response);
        Ok(response)
    }
}
