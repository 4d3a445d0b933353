//! In-process queue client.
//!
//! Queues live in memory and every report is recorded, which makes this the
//! backend for local runs and for tests. Sign-in succeeds immediately on
//! connect. Messages are delivered explicitly with [`MemoryQueueClient::deliver`].

use super::{ClientEvent, EventHandler, EventHandlers, MessageHandler, QueueClient};
use crate::error::{Error, Result};
use crate::model::Workitem;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// One `update_workitem` call as the service would have received it.
#[derive(Debug, Clone)]
pub struct Update {
    pub workitem: Workitem,
    pub files: Vec<PathBuf>,
}

/// Injected failures, each consumed by the next call of that operation.
#[derive(Debug, Default)]
struct Failures {
    connect: Option<String>,
    register: Option<String>,
    pop: Option<String>,
    update: Option<String>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, VecDeque<Workitem>>,
    consumers: HashMap<String, MessageHandler>,
    updates: Vec<Update>,
    infos: Vec<String>,
    errors: Vec<String>,
    pops: usize,
    failures: Failures,
}

#[derive(Default)]
pub struct MemoryQueueClient {
    inner: Mutex<Inner>,
    events: EventHandlers,
}

impl MemoryQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a workitem on `wiq`.
    pub fn push(&self, wiq: &str, workitem: Workitem) {
        self.inner()
            .queues
            .entry(wiq.to_string())
            .or_default()
            .push_back(workitem);
    }

    /// Enqueue the single placeholder item used for local smoke runs.
    pub fn seed_dummy(&self, wiq: &str) {
        let mut item = Workitem::new("dummy", serde_json::json!({"initial": true}));
        item.id = format!("wi_{}", uuid::Uuid::new_v4().simple());
        self.push(wiq, item);
    }

    /// Simulate a message arriving on `queue`: fires the registered handler.
    ///
    /// Returns `false` when nothing is registered on that queue. Handlers
    /// bound to a drain loop spawn onto the current tokio runtime.
    pub fn deliver(&self, queue: &str) -> bool {
        let handler = self.inner().consumers.get(queue).cloned();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Workitems still waiting on `wiq`.
    pub fn pending(&self, wiq: &str) -> usize {
        self.inner().queues.get(wiq).map_or(0, VecDeque::len)
    }

    pub fn updates(&self) -> Vec<Update> {
        self.inner().updates.clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.inner().infos.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.inner().errors.clone()
    }

    /// Number of `pop_workitem` calls, empty pops included.
    pub fn pop_calls(&self) -> usize {
        self.inner().pops
    }

    pub fn registered_queues(&self) -> Vec<String> {
        self.inner().consumers.keys().cloned().collect()
    }

    pub fn fail_next_connect(&self, message: impl Into<String>) {
        self.inner().failures.connect = Some(message.into());
    }

    pub fn fail_next_register(&self, message: impl Into<String>) {
        self.inner().failures.register = Some(message.into());
    }

    pub fn fail_next_pop(&self, message: impl Into<String>) {
        self.inner().failures.pop = Some(message.into());
    }

    pub fn fail_next_update(&self, message: impl Into<String>) {
        self.inner().failures.update = Some(message.into());
    }

    /// Emit a lifecycle event to the registered handlers.
    pub fn emit(&self, event: ClientEvent) {
        self.events.emit(&event);
    }
}

#[async_trait]
impl QueueClient for MemoryQueueClient {
    async fn connect(&self) -> Result<()> {
        if let Some(message) = self.inner().failures.connect.take() {
            return Err(Error::Client(message));
        }
        self.events.emit(&ClientEvent::Connecting);
        self.events.emit(&ClientEvent::SignedIn);
        Ok(())
    }

    fn on_event(&self, handler: EventHandler) {
        self.events.add(handler);
    }

    async fn register_queue(&self, queuename: &str, on_message: MessageHandler) -> Result<String> {
        let mut inner = self.inner();
        if let Some(message) = inner.failures.register.take() {
            return Err(Error::Client(message));
        }
        inner.consumers.insert(queuename.to_string(), on_message);
        Ok(queuename.to_string())
    }

    async fn pop_workitem(&self, wiq: &str) -> Result<Option<Workitem>> {
        let mut inner = self.inner();
        inner.pops += 1;
        if let Some(message) = inner.failures.pop.take() {
            return Err(Error::Client(message));
        }
        let popped = inner.queues.get_mut(wiq).and_then(VecDeque::pop_front);
        Ok(popped.map(|mut item| {
            item.wiq = Some(wiq.to_string());
            item
        }))
    }

    async fn update_workitem(&self, workitem: &Workitem, files: &[PathBuf]) -> Result<()> {
        let mut inner = self.inner();
        if let Some(message) = inner.failures.update.take() {
            return Err(Error::Client(message));
        }
        info!(
            id = %workitem.id,
            state = %workitem.state,
            files = files.len(),
            "workitem updated"
        );
        inner.updates.push(Update {
            workitem: workitem.clone(),
            files: files.to_vec(),
        });
        Ok(())
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "workitem_agent::client", "{message}");
        self.inner().infos.push(message.to_string());
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "workitem_agent::client", "{message}");
        self.inner().errors.push(message.to_string());
    }
}
