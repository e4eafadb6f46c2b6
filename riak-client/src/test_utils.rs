//! Test utilities: a scripted transport that records every request

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::transport::{Request, Response, Transport};
use crate::{Client, ClientConfig, ClientError, Result};

/// Transport answering from a queue of canned responses.
///
/// Running out of responses is reported as a connection error so a test
/// that issues an unexpected request fails loudly.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Response>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    pub fn push_response(&self, response: Response) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: ClientError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Every request performed so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, request: &Request) -> Result<Response> {
        let description = format!("{} {}", request.method, request.path_and_query());
        self.requests.lock().push(request.clone());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(ClientError::Connection(format!(
                "no scripted response for {}",
                description
            )))
        })
    }
}

/// A client wired to a fresh [`MockTransport`].
pub fn mock_client(config: ClientConfig) -> (Client, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let client = Client::builder(config)
        .transport(transport.clone())
        .build()
        .expect("mock client configuration is valid");
    (client, transport)
}
