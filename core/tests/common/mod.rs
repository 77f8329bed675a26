//! Scripted in-memory `Transport` for store tests.
//!
//! Replies are served in FIFO order. A gated reply blocks its request until
//! the test releases it, which lets a test observe the store mid-flight and
//! control the order in which overlapping actions finish.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use datafetch_core::{
    ApiError, DatasourceApi, DatasourceClient, DatasourceStore, HttpRequest, HttpResponse,
    Transport,
};
use tokio::sync::oneshot;

pub const BASE_URL: &str = "http://backend.test";

pub type Reply = Result<HttpResponse, ApiError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(Scripted::Ready(reply));
        self
    }

    pub fn json(&self, status: u16, body: &str) -> &Self {
        self.reply(Ok(HttpResponse::new(status, body)))
    }

    /// Queue a reply that is only delivered once the returned sender fires.
    pub fn gated(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Scripted::Gated(rx));
        tx
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Yield until `count` requests have reached the transport.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Transport("gate dropped".to_string()))),
            None => Err(ApiError::Transport("no scripted reply".to_string())),
        }
    }
}

pub fn store(transport: &ScriptedTransport) -> DatasourceStore<ScriptedTransport> {
    DatasourceStore::new(DatasourceApi::new(
        DatasourceClient::new(BASE_URL),
        transport.clone(),
    ))
}
