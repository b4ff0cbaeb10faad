//! In-memory diagram server for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{DiagramServer, RenderError, ServerResponse};

/// Replays queued responses and records every requested URL.
///
/// A request with no queued response fails like a refused connection.
///
/// # Example
///
/// ```ignore
/// let server = MockServer::new().with_response(200, b"<svg/>".to_vec());
/// let renderer = ServerRenderer::new(&server, "http://localhost:8080");
/// // ... render ...
/// assert_eq!(server.requests(), vec!["http://localhost:8080/svg/..."]);
/// ```
#[derive(Debug, Default)]
pub struct MockServer {
    responses: Mutex<VecDeque<ServerResponse>>,
    requests: Mutex<Vec<String>>,
}

impl MockServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_response(self, status: u16, body: Vec<u8>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(ServerResponse { status, body });
        self
    }

    /// URLs requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl DiagramServer for MockServer {
    fn get(&self, url: &str) -> Result<ServerResponse, RenderError> {
        self.requests.lock().unwrap().push(url.to_owned());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RenderError::Http {
                url: url.to_owned(),
                message: "connection refused".to_owned(),
            })
    }
}
