//! Drain loop: pop workitems until the queue is empty.

use crate::client::{MessageHandler, QueueClient};
use crate::config::{Config, DEFAULT_WIQ};
use crate::error::Result;
use crate::processor::WorkitemProcessor;
use crate::snapshot::DirectorySnapshot;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

use super::single_flight::SingleFlight;
use super::wrapper::ProcessingWrapper;

/// Configuration for a drain loop.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Work-item queue to pop from.
    pub wiq: String,
    /// Working directory the processor writes into.
    pub work_dir: PathBuf,
    /// Ephemeral instance id; when set, the agent shuts down after a pass.
    pub vmid: Option<String>,
    /// Upper bound on one processing step.
    pub processing_timeout: Option<Duration>,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            wiq: DEFAULT_WIQ.to_string(),
            work_dir: PathBuf::from("."),
            vmid: None,
            processing_timeout: None,
        }
    }
}

impl From<&Config> for DrainConfig {
    fn from(config: &Config) -> Self {
        Self {
            wiq: config.wiq.clone(),
            work_dir: config.work_dir.clone(),
            vmid: config.vmid.clone(),
            processing_timeout: config.processing_timeout,
        }
    }
}

/// What a trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was running; the trigger was dropped.
    Skipped,
    /// The queue reported empty after `processed` items.
    Drained { processed: usize },
    /// A pop or update call failed after `processed` items.
    Aborted { processed: usize, error: String },
}

/// Pops and processes workitems, one drain at a time.
pub struct DrainLoop {
    client: Arc<dyn QueueClient>,
    wrapper: ProcessingWrapper,
    config: DrainConfig,
    /// Working-directory contents before any processing ran.
    baseline: DirectorySnapshot,
    flight: SingleFlight,
    shutdown: Arc<Notify>,
}

impl DrainLoop {
    pub fn new(
        client: Arc<dyn QueueClient>,
        processor: Arc<dyn WorkitemProcessor>,
        config: DrainConfig,
        baseline: DirectorySnapshot,
    ) -> Self {
        let wrapper = ProcessingWrapper::new(
            Arc::clone(&client),
            processor,
            config.work_dir.clone(),
            config.processing_timeout,
        );
        Self {
            client,
            wrapper,
            config,
            baseline,
            flight: SingleFlight::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Notified after a pass in an ephemeral instance; the process should exit.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_draining(&self) -> bool {
        self.flight.is_busy()
    }

    pub fn baseline(&self) -> &DirectorySnapshot {
        &self.baseline
    }

    /// Run one drain pass unless one is already running.
    pub async fn trigger(&self) -> DrainOutcome {
        let queue_label = KeyValue::new("queue", self.config.wiq.clone());
        let Some(_flight) = self.flight.try_acquire() else {
            debug!(wiq = %self.config.wiq, "drain already running, trigger dropped");
            metrics::triggers_dropped().add(1, &[queue_label]);
            return DrainOutcome::Skipped;
        };

        let mut processed = 0;
        let result = self.drain(&mut processed).await;
        DirectorySnapshot::cleanup(&self.config.work_dir, &self.baseline);

        let outcome = match result {
            Ok(()) => DrainOutcome::Drained { processed },
            Err(e) => {
                self.client.error(&format!("drain of {} aborted: {e}", self.config.wiq));
                DrainOutcome::Aborted {
                    processed,
                    error: e.to_string(),
                }
            }
        };
        let result_label = match outcome {
            DrainOutcome::Aborted { .. } => "aborted",
            _ => "drained",
        };
        metrics::drain_passes().add(1, &[queue_label, KeyValue::new("result", result_label)]);

        if let Some(vmid) = &self.config.vmid {
            self.client.info(&format!(
                "Exiting application as running in serverless VM {vmid}"
            ));
            self.shutdown.notify_one();
        }
        outcome
    }

    async fn drain(&self, processed: &mut usize) -> Result<()> {
        let wiq = &self.config.wiq;
        while let Some(workitem) = self.client.pop_workitem(wiq).await? {
            *processed += 1;
            info!(id = %workitem.id, %wiq, "popped workitem");
            self.wrapper.handle(&self.baseline, workitem).await?;
            DirectorySnapshot::cleanup(&self.config.work_dir, &self.baseline);
        }
        if *processed > 0 {
            self.client
                .info(&format!("No more workitems in {wiq} workitem queue"));
        }
        Ok(())
    }

    /// Handler for `register_queue`: each message spawns a trigger on the
    /// current tokio runtime.
    pub fn message_handler(self: &Arc<Self>) -> MessageHandler {
        let this = Arc::clone(self);
        Arc::new(move || {
            let this = Arc::clone(&this);
            tokio::spawn(async move {
                this.trigger().await;
            });
        })
    }
}
