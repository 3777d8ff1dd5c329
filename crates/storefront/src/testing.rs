//! Scripted in-memory gateway for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiError, Gateway};
use crate::notify::Notifier;
use crate::snapshot::MemorySnapshots;
use crate::store::StoreContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

/// A scripted response.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16, &'static str),
}

impl Reply {
    fn into_result(self, path: &str) -> Result<Value, ApiError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Status(401, _) => Err(ApiError::Unauthorized),
            Self::Status(403, message) => Err(ApiError::Forbidden(message.to_string())),
            Self::Status(404, _) => Err(ApiError::NotFound(path.to_string())),
            Self::Status(status, message) if status >= 500 => Err(ApiError::Server {
                status,
                message: message.to_string(),
            }),
            Self::Status(status, message) => Err(ApiError::Validation {
                status,
                message: message.to_string(),
            }),
        }
    }
}

/// A recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub verb: Verb,
    pub path: String,
    pub body: Option<Value>,
}

/// Gateway answering from per-route queues.
///
/// Each reply is served once, except the last one queued for a route, which
/// repeats until another is queued behind it. Unscripted routes answer 404.
/// A route can be slowed down with [`MockGateway::delay`].
#[derive(Debug, Default)]
pub struct MockGateway {
    routes: Mutex<HashMap<(Verb, String), VecDeque<(Reply, bool)>>>,
    delays: Mutex<HashMap<(Verb, String), Duration>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, verb: Verb, path: &str, reply: Reply) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.entry((verb, path.to_string())).or_default();
        if queue.front().is_some_and(|(_, served)| *served) {
            queue.pop_front();
        }
        queue.push_back((reply, false));
        drop(routes);
        self
    }

    pub fn ok(&self, verb: Verb, path: &str, body: Value) -> &Self {
        self.on(verb, path, Reply::Json(body))
    }

    pub fn fail(&self, verb: Verb, path: &str, status: u16) -> &Self {
        self.on(verb, path, Reply::Status(status, "scripted failure"))
    }

    /// Hold every later request to this route for `delay` before answering.
    pub fn delay(&self, verb: Verb, path: &str, delay: Duration) -> &Self {
        self.delays
            .lock()
            .unwrap()
            .insert((verb, path.to_string()), delay);
        self
    }

    /// Most requests that were awaiting an answer at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, verb: Verb, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.verb == verb && call.path == path)
            .count()
    }

    async fn answer(&self, verb: Verb, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(Call {
            verb,
            path: path.to_string(),
            body: body.cloned(),
        });

        let delay = self.delays.lock().unwrap().get(&(verb, path.to_string())).copied();
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .get_mut(&(verb, path.to_string()))
                .and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front().map(|(reply, _)| reply)
                    } else {
                        queue.front_mut().map(|(reply, served)| {
                            *served = true;
                            reply.clone()
                        })
                    }
                })
        };
        reply.map_or_else(
            || Err(ApiError::NotFound(path.to_string())),
            |reply| reply.into_result(path),
        )
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.answer(Verb::Get, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.answer(Verb::Post, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.answer(Verb::Patch, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.answer(Verb::Put, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.answer(Verb::Delete, path, None).await.map(|_| ())
    }
}

/// Store collaborators wired to a mock gateway and in-memory snapshots.
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub snapshots: Arc<MemorySnapshots>,
    pub notifier: Notifier,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            gateway: MockGateway::new(),
            snapshots: Arc::new(MemorySnapshots::new()),
            notifier: Notifier::default(),
        }
    }

    pub fn context(&self) -> StoreContext {
        StoreContext::new(
            Arc::clone(&self.gateway) as Arc<dyn Gateway>,
            Arc::clone(&self.snapshots) as Arc<dyn crate::snapshot::SnapshotStore>,
            self.notifier.clone(),
        )
    }
}

/// `{results, count, next, previous}` envelope.
pub fn page(results: Value) -> Value {
    let count = results.as_array().map_or(0, Vec::len);
    serde_json::json!({
        "results": results,
        "count": count,
        "next": null,
        "previous": null,
    })
}
