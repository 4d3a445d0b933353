//! Processing wrapper: run the processor, map the outcome onto the
//! workitem, report it together with any files it produced.

use crate::client::QueueClient;
use crate::error::Result;
use crate::model::Workitem;
use crate::processor::WorkitemProcessor;
use crate::snapshot::{DirectorySnapshot, paths_in};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_state_transition, start_workitem_span};
use opentelemetry::KeyValue;
use std::backtrace::BacktraceStatus;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug};

/// `errormessage` for a failure whose message is empty.
pub const APPLICATION_ERROR: &str = "application error";

pub struct ProcessingWrapper {
    client: Arc<dyn QueueClient>,
    processor: Arc<dyn WorkitemProcessor>,
    work_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessingWrapper {
    pub fn new(
        client: Arc<dyn QueueClient>,
        processor: Arc<dyn WorkitemProcessor>,
        work_dir: PathBuf,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            processor,
            work_dir,
            timeout,
        }
    }

    /// Process one workitem and report it.
    ///
    /// Processing failures never escape: they become `retry` state on the
    /// workitem. Files in the working directory that aren't in `baseline`
    /// are attached to the report. The only error returned is a failed
    /// update call. Returns the workitem as reported.
    pub async fn handle(
        &self,
        baseline: &DirectorySnapshot,
        mut workitem: Workitem,
    ) -> Result<Workitem> {
        let wiq = workitem.wiq.clone().unwrap_or_default();
        let span = start_workitem_span(&wiq, &workitem.id, workitem.retries);
        let recorder = span.clone();

        async move {
            let from = workitem.state.to_string();
            let started = Instant::now();

            match self.run_processor(&mut workitem).await {
                Ok(()) => workitem.mark_successful(),
                Err(e) => {
                    let mut message = e.to_string();
                    if message.is_empty() {
                        message = APPLICATION_ERROR.to_string();
                    }
                    self.client
                        .error(&format!("workitem {} failed: {message}", workitem.id));
                    workitem.mark_retry(message, error_source(&e));
                }
            }

            let queue_label = KeyValue::new("queue", wiq.clone());
            metrics::processing_duration_ms().record(
                started.elapsed().as_secs_f64() * 1000.0,
                std::slice::from_ref(&queue_label),
            );
            record_state_transition(&recorder, &from, &workitem.state.to_string());

            let current = DirectorySnapshot::capture(&self.work_dir);
            let produced = DirectorySnapshot::diff(baseline, &current);
            let files = paths_in(&self.work_dir, &produced);
            debug!(files = files.len(), "reporting workitem");
            self.client.update_workitem(&workitem, &files).await?;

            metrics::workitems_processed().add(
                1,
                &[queue_label, KeyValue::new("state", workitem.state.to_string())],
            );
            Ok::<_, crate::error::Error>(workitem)
        }
        .instrument(span)
        .await
    }

    async fn run_processor(&self, workitem: &mut Workitem) -> anyhow::Result<()> {
        let work = self.processor.process(&self.work_dir, workitem);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                Err(anyhow::anyhow!(
                    "processing timed out after {}s",
                    limit.as_secs()
                ))
            }),
            None => work.await,
        }
    }
}

/// Where a failure came from: the captured backtrace, else the cause chain.
fn error_source(e: &anyhow::Error) -> Option<String> {
    let backtrace = e.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        return Some(backtrace.to_string());
    }
    let causes: Vec<String> = e.chain().skip(1).map(ToString::to_string).collect();
    (!causes.is_empty()).then(|| causes.join(": "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn error_source_falls_back_to_cause_chain() {
        let e = std::fs::read("/definitely/not/here")
            .context("loading input")
            .unwrap_err();
        let source = error_source(&e);
        // With RUST_BACKTRACE set the backtrace wins; either way there is a source.
        assert!(source.is_some());
    }

    #[test]
    fn error_source_none_for_bare_message() {
        let e = anyhow::anyhow!("boom");
        if e.backtrace().status() != BacktraceStatus::Captured {
            assert_eq!(error_source(&e), None);
        }
    }
}
