//! In-memory transport that answers from a script.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::{QueryRequest, QueryResponse, QueryTransport, Result, TransportError};

type Responder = Box<dyn Fn(&QueryRequest) -> Result<QueryResponse> + Send + Sync>;

enum Reply {
    Response(QueryResponse),
    Failure(String),
}

struct Scripted {
    reply: Reply,
    delay: Option<Duration>,
}

/// A [`QueryTransport`] that never leaves the process.
///
/// Replies are served first from the queue filled with [`push_reply`](Self::push_reply)
/// and friends, then from the optional responder closure. Every request is
/// recorded so tests can assert on what the core actually sent.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request that is not covered by a queued reply with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&QueryRequest) -> Result<QueryResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, response: QueryResponse) {
        self.push(Reply::Response(response), None);
    }

    /// Queue a reply that is only delivered after `delay`.
    pub fn push_delayed_reply(&self, response: QueryResponse, delay: Duration) {
        self.push(Reply::Response(response), Some(delay));
    }

    /// Queue a transport-level failure (the endpoint could not be reached).
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Reply::Failure(message.into()), None);
    }

    fn push(&self, reply: Reply, delay: Option<Duration>) {
        self.queue.lock().push_back(Scripted { reply, delay });
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl QueryTransport for ScriptedTransport {
    #[instrument(name = "Scripted query", level = "debug", skip_all)]
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.requests.lock().push(request.clone());

        // The lock guard must be gone before the await below.
        let next = self.queue.lock().pop_front();
        match next {
            Some(Scripted { reply, delay }) => {
                if let Some(delay) = delay {
                    debug!(?delay, "Delaying scripted reply");
                    tokio::time::sleep(delay).await;
                }
                match reply {
                    Reply::Response(response) => Ok(response),
                    Reply::Failure(message) => Err(TransportError::Unavailable(message)),
                }
            }
            None => match &self.responder {
                Some(responder) => responder(request),
                None => Err(TransportError::Exhausted),
            },
        }
    }
}
