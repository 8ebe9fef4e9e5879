//! In-memory transport for tests.
//!
//! Compiled for this crate's unit tests and, for downstream crates, behind
//! the `test-util` feature.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::{IntegrationError, IntegrationResult, NetworkFault};
use crate::http::{HttpRequest, HttpResponse, Transport};

/// One scripted reply: a response or a transport fault.
pub type Reply = IntegrationResult<HttpResponse>;

#[derive(Debug)]
struct Route {
    pattern: String,
    replies: VecDeque<Reply>,
}

/// In-memory transport that replays scripted replies and records requests.
///
/// Replies are keyed by a URL substring. Each route hands out its replies in
/// order and keeps repeating the last one once the queue is drained.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Script replies for requests whose URL contains `pattern`.
    pub fn route(self, pattern: impl Into<String>, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Route {
                pattern: pattern.into(),
                replies: replies.into(),
            });
        self
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose URL contains `pattern`.
    pub fn calls_to(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.url.contains(pattern))
            .count()
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(route) = routes.iter_mut().find(|r| url.contains(&r.pattern)) else {
            return Err(IntegrationError::network(
                NetworkFault::Other,
                format!("no scripted reply for {}", url),
            ));
        };
        if route.replies.len() > 1 {
            route.replies.pop_front().unwrap_or_else(|| {
                Err(IntegrationError::network(NetworkFault::Other, "empty script"))
            })
        } else {
            route.replies.front().cloned().unwrap_or_else(|| {
                Err(IntegrationError::network(NetworkFault::Other, "empty script"))
            })
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> IntegrationResult<HttpResponse> {
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_reply(&url)
    }
}
