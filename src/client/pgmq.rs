//! Postgres + pgmq queue client.
//!
//! Work-item queues are pgmq queues holding workitem JSON. A registered
//! consumer wakes on `LISTEN <queue>_ready` and on a poll interval, and
//! fires its handler either way; the drain loop's single-flight guard
//! absorbs the overlap. Popping reads a message under a visibility timeout;
//! it is archived only once its report has been written, so an item whose
//! update fails becomes visible again. Retried items go back on their queue
//! after a delay, successful ones move to `<wiq>_done`.

use super::{ClientEvent, EventHandler, EventHandlers, MessageHandler, QueueClient};
use crate::db::Db;
use crate::db::pgmq::ready_channel;
use crate::error::{Error, Result};
use crate::model::{State, Workitem};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the pgmq client.
#[derive(Debug, Clone)]
pub struct PgmqConfig {
    /// Queue assumed for workitems that don't say where they came from.
    pub default_wiq: String,
    /// Poll interval fallback when no NOTIFY arrives.
    pub poll_interval: Duration,
    /// Delay before a `retry` item becomes visible again.
    pub retry_delay_seconds: i32,
    /// How long a popped, unreported item stays hidden from other readers.
    pub visibility_timeout_seconds: i32,
}

impl PgmqConfig {
    pub fn new(default_wiq: impl Into<String>) -> Self {
        Self {
            default_wiq: default_wiq.into(),
            poll_interval: Duration::from_secs(5),
            retry_delay_seconds: 30,
            visibility_timeout_seconds: 300,
        }
    }
}

/// Queue for workitems that finished successfully.
pub fn done_queue(wiq: &str) -> String {
    format!("{wiq}_done")
}

pub struct PgmqQueueClient {
    database_url: SecretString,
    config: PgmqConfig,
    db: OnceCell<Arc<Db>>,
    events: EventHandlers,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    /// pgmq message ids of popped items not yet reported, by (wiq, id).
    in_flight: Mutex<HashMap<(String, String), i64>>,
}

impl PgmqQueueClient {
    pub fn new(database_url: SecretString, config: PgmqConfig) -> Self {
        Self {
            database_url,
            config,
            db: OnceCell::new(),
            events: EventHandlers::default(),
            consumers: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn db(&self) -> Result<&Arc<Db>> {
        self.db
            .get()
            .ok_or_else(|| Error::Client("pgmq client is not connected".to_string()))
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), i64>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop all consumer tasks.
    pub fn close(&self) {
        let consumers = std::mem::take(
            &mut *self.consumers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if consumers.is_empty() {
            return;
        }
        for handle in consumers {
            handle.abort();
        }
        self.events.emit(&ClientEvent::Disconnected);
    }
}

impl Drop for PgmqQueueClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Wait for work on `queue` and fire `on_message` each time there may be some.
async fn consume(db: Arc<Db>, queue: String, poll_interval: Duration, on_message: MessageHandler) {
    let channel = ready_channel(&queue);
    let mut listener = match sqlx::postgres::PgListener::connect_with(db.pool()).await {
        Ok(mut listener) => match listener.listen(&channel).await {
            Ok(()) => Some(listener),
            Err(e) => {
                warn!(%queue, "LISTEN failed: {e}, polling only");
                None
            }
        },
        Err(e) => {
            warn!(%queue, "PgListener connect failed: {e}, polling only");
            None
        }
    };

    loop {
        match listener.as_mut() {
            Some(l) => {
                tokio::select! {
                    notif = l.recv() => match notif {
                        Ok(_) => debug!(%queue, "notified of new work"),
                        Err(e) => warn!(%queue, "PgListener error: {e}, falling back to poll"),
                    },
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            None => tokio::time::sleep(poll_interval).await,
        }
        on_message();
    }
}

#[async_trait]
impl QueueClient for PgmqQueueClient {
    async fn connect(&self) -> Result<()> {
        self.events.emit(&ClientEvent::Connecting);
        let db = self
            .db
            .get_or_try_init(|| async {
                let db = Db::connect(self.database_url.expose_secret()).await?;
                db.ensure_schema().await?;
                Ok::<_, Error>(Arc::new(db))
            })
            .await?;
        db.health_check().await?;
        info!("connected to pgmq");
        self.events.emit(&ClientEvent::SignedIn);
        Ok(())
    }

    fn on_event(&self, handler: EventHandler) {
        self.events.add(handler);
    }

    async fn register_queue(&self, queuename: &str, on_message: MessageHandler) -> Result<String> {
        let db = Arc::clone(self.db()?);
        db.create_queue(queuename).await?;

        let handle = tokio::spawn(consume(
            db,
            queuename.to_string(),
            self.config.poll_interval,
            on_message,
        ));
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(queuename.to_string())
    }

    async fn pop_workitem(&self, wiq: &str) -> Result<Option<Workitem>> {
        let Some(msg) = self
            .db()?
            .read_from_queue(wiq, self.config.visibility_timeout_seconds)
            .await?
        else {
            return Ok(None);
        };
        let mut item: Workitem = serde_json::from_value(msg.message)?;
        if item.id.is_empty() {
            item.id = msg.msg_id.to_string();
        }
        item.wiq = Some(wiq.to_string());

        let age_ms = (chrono::Utc::now() - msg.enqueued_at).num_milliseconds();
        debug!(
            id = %item.id,
            msg_id = msg.msg_id,
            read_ct = msg.read_ct,
            age_ms,
            "popped workitem"
        );
        self.in_flight()
            .insert((wiq.to_string(), item.id.clone()), msg.msg_id);
        Ok(Some(item))
    }

    async fn update_workitem(&self, workitem: &Workitem, files: &[PathBuf]) -> Result<()> {
        let db = self.db()?;

        for path in files {
            let content = tokio::fs::read(path).await?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            db.store_file(&workitem.id, &filename, &content).await?;
        }

        let wiq = workitem
            .wiq
            .clone()
            .unwrap_or_else(|| self.config.default_wiq.clone());

        match workitem.state {
            State::Successful => {
                let done = done_queue(&wiq);
                db.create_queue(&done).await?;
                db.send_to_queue(&done, &serde_json::to_value(workitem)?, 0)
                    .await?;
            }
            State::Retry => {
                let mut again = workitem.clone();
                again.retries += 1;
                again.state = State::New;
                db.send_to_queue(
                    &wiq,
                    &serde_json::to_value(&again)?,
                    self.config.retry_delay_seconds,
                )
                .await?;
            }
            State::New => {
                return Err(Error::Client(format!(
                    "workitem {} reported without a final state",
                    workitem.id
                )));
            }
        }

        // The report is written; only now drop the original message.
        let key = (wiq.clone(), workitem.id.clone());
        let msg_id = self.in_flight().get(&key).copied();
        if let Some(msg_id) = msg_id {
            db.archive_message(&wiq, msg_id).await?;
            self.in_flight().remove(&key);
        }

        info!(
            id = %workitem.id,
            state = %workitem.state,
            files = files.len(),
            "workitem updated"
        );
        Ok(())
    }
}
