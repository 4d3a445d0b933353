//! pgmq queue operations via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.read,
//! pgmq.archive, plus pg_notify to wake consumers.

use crate::error::Result;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// A message read from a pgmq queue.
#[derive(Debug, Clone)]
pub struct PgmqMessage {
    pub msg_id: i64,
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    pub message: serde_json::Value,
}

fn count_op(queue_name: &str, operation: &'static str) {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", queue_name.to_string()),
            KeyValue::new("operation", operation),
        ],
    );
}

/// Notification channel consumers of `queue_name` listen on.
pub fn ready_channel(queue_name: &str) -> String {
    format!("{queue_name}_ready")
}

impl super::Db {
    /// Create a pgmq queue (idempotent).
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(&self.pool)
            .await?;
        count_op(queue_name, "create");
        Ok(())
    }

    /// Send a message to a pgmq queue. Returns the message ID.
    /// delay_seconds: 0 for immediate, >0 for delayed delivery.
    pub async fn send_to_queue(
        &self,
        queue_name: &str,
        payload: &serde_json::Value,
        delay_seconds: i32,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(queue_name)
            .bind(payload)
            .bind(delay_seconds)
            .fetch_one(&self.pool)
            .await?;
        count_op(queue_name, "send");
        Ok(row.0)
    }

    /// Read the next visible message and hide it for `vt_seconds`.
    /// Returns None if the queue is empty. The message reappears unless it is
    /// archived before the visibility timeout runs out.
    pub async fn read_from_queue(
        &self,
        queue_name: &str,
        vt_seconds: i32,
    ) -> Result<Option<PgmqMessage>> {
        let row = sqlx::query_as::<_, (i64, i32, chrono::DateTime<chrono::Utc>, serde_json::Value)>(
            "SELECT msg_id, read_ct, enqueued_at, message FROM pgmq.read($1, $2, 1)",
        )
        .bind(queue_name)
        .bind(vt_seconds)
        .fetch_optional(&self.pool)
        .await?;

        let msg = row.map(|(msg_id, read_ct, enqueued_at, message)| PgmqMessage {
            msg_id,
            read_ct,
            enqueued_at,
            message,
        });
        count_op(queue_name, if msg.is_some() { "read" } else { "read_empty" });
        Ok(msg)
    }

    /// Archive a message (moves it to the archive table, out of the queue).
    pub async fn archive_message(&self, queue_name: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.archive($1, $2)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await?;
        count_op(queue_name, "archive");
        Ok(())
    }

    /// Wake consumers registered on `queue_name`.
    pub async fn notify_ready(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pg_notify($1, '')")
            .bind(ready_channel(queue_name))
            .execute(&self.pool)
            .await?;
        count_op(queue_name, "notify");
        Ok(())
    }
}
