//! In-memory transport for unit tests: replays canned responses in order
//! and records every request it was handed.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::client::CouchClient;
use crate::config::ConnectionConfig;
use crate::error::CouchError;
use crate::http::{HttpRequest, HttpResponse, Transport};

#[derive(Debug, Default)]
pub(crate) struct Recorder {
    requests: Mutex<Vec<HttpRequest>>,
    replies: Mutex<VecDeque<HttpResponse>>,
}

impl Recorder {
    pub(crate) fn with_replies(replies: Vec<HttpResponse>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for Recorder {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CouchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CouchError::Transport("no canned response left".to_string()))
    }
}

pub(crate) fn ok(body: &str) -> HttpResponse {
    status(200, body)
}

pub(crate) fn status(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

pub(crate) fn client(replies: Vec<HttpResponse>) -> CouchClient<Recorder> {
    CouchClient::new(ConnectionConfig::default(), Recorder::with_replies(replies))
}
