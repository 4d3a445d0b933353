//! Workitem processors: the business step applied to each popped item.

use crate::model::Workitem;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Transforms one workitem.
///
/// Implementations may create files in `work_dir`; they must not delete or
/// rename files that were already there. Any error is an application
/// failure and turns the item into a `retry`.
#[async_trait]
pub trait WorkitemProcessor: Send + Sync {
    async fn process(&self, work_dir: &Path, workitem: &mut Workitem) -> anyhow::Result<()>;
}

/// Placeholder business logic: tags the item, writes one file, then waits.
#[derive(Debug, Clone)]
pub struct HelloProcessor {
    pub greeting: String,
    pub file_name: String,
    /// Stands in for real asynchronous work.
    pub delay: Duration,
}

impl Default for HelloProcessor {
    fn default() -> Self {
        Self {
            greeting: "Hello kitty".to_string(),
            file_name: "hello.txt".to_string(),
            delay: Duration::from_secs(2),
        }
    }
}

impl HelloProcessor {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl WorkitemProcessor for HelloProcessor {
    async fn process(&self, work_dir: &Path, workitem: &mut Workitem) -> anyhow::Result<()> {
        info!(
            id = %workitem.id,
            retries = workitem.retries,
            "processing workitem"
        );

        workitem
            .payload_object()
            .insert("name".to_string(), Value::String(self.greeting.clone()));
        workitem.name = self.greeting.clone();

        tokio::fs::write(work_dir.join(&self.file_name), &self.greeting).await?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}
