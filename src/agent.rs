//! Connection bootstrap: connect, wait for sign-in, register the consumer.

use crate::client::{ClientEvent, QueueClient};
use crate::config::Config;
use crate::engine::{DrainConfig, DrainLoop};
use crate::error::{Error, Result};
use crate::processor::WorkitemProcessor;
use crate::snapshot::DirectorySnapshot;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tracing::info;

/// A queue client wired to a drain loop.
pub struct Agent {
    client: Arc<dyn QueueClient>,
    drain: Arc<DrainLoop>,
    queue: String,
    ephemeral: bool,
}

impl Agent {
    /// Build an agent. The working directory is snapshotted here; anything
    /// that appears in it later is treated as processing output.
    pub fn new(
        client: Arc<dyn QueueClient>,
        processor: Arc<dyn WorkitemProcessor>,
        config: &Config,
    ) -> Self {
        let baseline = DirectorySnapshot::capture(&config.work_dir);
        let drain = DrainLoop::new(
            Arc::clone(&client),
            processor,
            DrainConfig::from(config),
            baseline,
        );
        Self {
            client,
            drain: Arc::new(drain),
            queue: config.queue.clone(),
            ephemeral: config.is_ephemeral(),
        }
    }

    pub fn drain(&self) -> &Arc<DrainLoop> {
        &self.drain
    }

    /// Fires when the agent should exit: after a pass in an ephemeral
    /// instance, or when re-registration after a reconnect fails.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.drain.shutdown_signal()
    }

    /// Connect and register the consumer.
    ///
    /// Returns once the first sign-in has been handled; in an ephemeral
    /// instance that includes one full drain pass. Any error here is fatal
    /// to the process. Later sign-ins (reconnects) re-register in the
    /// background.
    pub async fn start(&self) -> Result<()> {
        let (signed_in_tx, mut signed_in) = mpsc::unbounded_channel();
        self.client.on_event(Arc::new(move |event: &ClientEvent| {
            if event.is_signed_in() {
                let _ = signed_in_tx.send(());
            }
        }));

        self.client.connect().await?;
        signed_in
            .recv()
            .await
            .ok_or_else(|| Error::Client("event stream closed before sign-in".to_string()))?;

        register_consumer(&self.client, &self.drain, &self.queue).await?;
        if self.ephemeral {
            self.drain.trigger().await;
        }

        let client = Arc::clone(&self.client);
        let drain = Arc::clone(&self.drain);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            while signed_in.recv().await.is_some() {
                info!(%queue, "signed in again, re-registering consumer");
                if let Err(e) = register_consumer(&client, &drain, &queue).await {
                    client.error(&format!("re-registering {queue} failed: {e}"));
                    drain.shutdown_signal().notify_one();
                    break;
                }
            }
        });

        Ok(())
    }
}

async fn register_consumer(
    client: &Arc<dyn QueueClient>,
    drain: &Arc<DrainLoop>,
    queue: &str,
) -> Result<String> {
    let resolved = client.register_queue(queue, drain.message_handler()).await?;
    client.info(&format!("Consuming message queue: {resolved}"));
    Ok(resolved)
}
