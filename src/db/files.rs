//! Storage for files attached to workitem updates.

use crate::error::Result;

/// A file stored against a workitem.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub workitem_id: String,
    pub filename: String,
    pub content: Vec<u8>,
}

impl super::Db {
    /// Store one attachment.
    pub async fn store_file(
        &self,
        workitem_id: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO workitem_files (workitem_id, filename, content) VALUES ($1, $2, $3)",
        )
        .bind(workitem_id)
        .bind(filename)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Attachments for a workitem, oldest first.
    pub async fn files_for(&self, workitem_id: &str) -> Result<Vec<StoredFile>> {
        let rows = sqlx::query_as::<_, (String, String, Vec<u8>)>(
            "SELECT workitem_id, filename, content FROM workitem_files
             WHERE workitem_id = $1 ORDER BY id",
        )
        .bind(workitem_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(workitem_id, filename, content)| StoredFile {
                workitem_id,
                filename,
                content,
            })
            .collect())
    }
}
