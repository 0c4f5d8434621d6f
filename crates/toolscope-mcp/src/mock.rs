//! In-memory transport for unit tests.

use crate::error::McpError;
use crate::jsonrpc::JsonRpcResponse;
use crate::transport::{BoxFuture, Transport};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) enum MockReply {
    Result(serde_json::Value),
    Error(i64, String),
    Closed,
}

type Handler = dyn Fn(&str, Option<&serde_json::Value>) -> MockReply + Send + Sync;

/// Shared view of what a [`MockTransport`] has seen.
#[derive(Clone, Default)]
pub(crate) struct MockLog {
    calls: Arc<Mutex<Vec<(String, Option<serde_json::Value>)>>>,
    shut_down: Arc<AtomicBool>,
}

impl MockLog {
    pub(crate) fn calls(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }

    pub(crate) fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockTransport {
    handler: Box<Handler>,
    next_id: AtomicU64,
    log: MockLog,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, Option<&serde_json::Value>) -> MockReply + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            next_id: AtomicU64::new(1),
            log: MockLog::default(),
        }
    }

    pub(crate) fn log(&self) -> MockLog {
        self.log.clone()
    }

    fn record(&self, method: &str, params: &Option<serde_json::Value>) {
        self.log
            .calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));
    }
}

impl Transport for MockTransport {
    fn send_request<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<JsonRpcResponse, McpError>> {
        Box::pin(async move {
            self.record(method, &params);
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            match (self.handler)(method, params.as_ref()) {
                MockReply::Result(value) => Ok(JsonRpcResponse::success(id, value)),
                MockReply::Error(code, message) => Ok(JsonRpcResponse::failure(id, code, message)),
                MockReply::Closed => Err(McpError::TransportClosed {
                    name: "mock".to_string(),
                }),
            }
        })
    }

    fn send_notification<'a>(
        &'a self,
        method: &'a str,
        params: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<(), McpError>> {
        Box::pin(async move {
            self.record(method, &params);
            Ok(())
        })
    }

    fn shutdown(self: Box<Self>) -> BoxFuture<'static, ()> {
        self.log.shut_down.store(true, Ordering::SeqCst);
        Box::pin(async {})
    }
}
