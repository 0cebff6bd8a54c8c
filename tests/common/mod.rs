//! Purpose: Shared fixtures for integration tests.
//! Exports: `MockTransport`, `status_error`, `client`.
//! Role: Scripted in-memory transport so manager/model behavior is tested without a network.
//! Invariants: Responses are served in the order they were queued; every request is recorded.
#![allow(dead_code)]

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use syncano::api::{ApiResult, Client, Error, ErrorKind, Request, Transport};
use syncano::models::default_registry;

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<ApiResult<Value>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Value) {
        self.lock_responses().push_back(Ok(response));
    }

    pub fn push_error(&self, err: Error) {
        self.lock_responses().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<ApiResult<Value>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Transport for MockTransport {
    fn request(&self, request: &Request) -> ApiResult<Value> {
        self.requests
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(request.clone());
        self.lock_responses().pop_front().unwrap_or_else(|| {
            Err(Error::new(ErrorKind::Internal).with_message("no scripted response left"))
        })
    }
}

pub fn status_error(status: u16, body: Value) -> Error {
    Error::new(ErrorKind::Request)
        .with_status(status)
        .with_message(format!("status {status}"))
        .with_body(body)
}

/// Client over the built-in models and a fresh scripted transport.
pub fn client() -> (Client, Arc<MockTransport>) {
    let mock = MockTransport::new();
    let transport: Arc<dyn Transport> = mock.clone();
    let registry = default_registry().expect("registry");
    (Client::new(registry, transport), mock)
}
