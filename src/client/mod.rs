//! Queue client capability set.
//!
//! The agent talks to the work-item service only through [`QueueClient`].
//! Adapters are interchangeable: [`memory::MemoryQueueClient`] keeps queues
//! in-process, [`pgmq::PgmqQueueClient`] uses Postgres + pgmq.

pub mod memory;
pub mod pgmq;

use crate::error::Result;
use crate::model::Workitem;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Zero-argument callback fired when a message lands on a registered queue.
pub type MessageHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback fired for every client lifecycle event.
pub type EventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Lifecycle events emitted by a queue client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connecting,
    SignedIn,
    Disconnected,
}

impl ClientEvent {
    /// Only sign-in events trigger consumer registration.
    pub fn is_signed_in(&self) -> bool {
        matches!(self, ClientEvent::SignedIn)
    }
}

/// Operations the agent consumes from the work-item service.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Open the connection. A successful sign-in is announced through
    /// [`ClientEvent::SignedIn`], not the return value.
    async fn connect(&self) -> Result<()>;

    /// Register a handler for client events.
    fn on_event(&self, handler: EventHandler);

    /// Subscribe `on_message` to `queuename`; returns the name actually used.
    async fn register_queue(&self, queuename: &str, on_message: MessageHandler) -> Result<String>;

    /// Pop one workitem without blocking. `None` when the queue is empty.
    async fn pop_workitem(&self, wiq: &str) -> Result<Option<Workitem>>;

    /// Report the final state of a workitem, with any files produced while
    /// processing it.
    async fn update_workitem(&self, workitem: &Workitem, files: &[PathBuf]) -> Result<()>;

    /// Informational log sink.
    fn info(&self, message: &str) {
        tracing::info!(target: "workitem_agent::client", "{message}");
    }

    /// Error log sink.
    fn error(&self, message: &str) {
        tracing::error!(target: "workitem_agent::client", "{message}");
    }
}

/// Event fan-out shared by the adapters.
#[derive(Default)]
pub struct EventHandlers {
    handlers: Mutex<Vec<EventHandler>>,
}

impl EventHandlers {
    pub fn add(&self, handler: EventHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Deliver `event` to every handler. Handlers run outside the lock so
    /// they may register further handlers.
    pub fn emit(&self, event: &ClientEvent) {
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(event);
        }
    }
}
