use sqlx::SqlitePool;

use super::now_timestamp;
use crate::error::Result;

/// Repository for numbering session records.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the start of a numbering session and return its id.
    pub async fn start(
        &self,
        guild_id: u64,
        channel_id: u64,
        host_id: i64,
        participants_count: usize,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO numbering_sessions
            (guild_id, channel_id, host_id, participants_count, started_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(channel_id as i64)
        .bind(host_id)
        .bind(participants_count as i64)
        .bind(now_timestamp())
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Mark a session as ended. Ending an already-ended session is a no-op
    /// on its original end time.
    pub async fn end(&self, session_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE numbering_sessions SET ended_at = ? WHERE session_id = ? AND ended_at IS NULL",
        )
        .bind(now_timestamp())
        .bind(session_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Total sessions ever started in a guild.
    pub async fn count(&self, guild_id: u64) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM numbering_sessions WHERE guild_id = ?",
        )
        .bind(guild_id as i64)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Whether a session exists and is still open.
    #[cfg(test)]
    pub async fn is_open(&self, session_id: i64) -> Result<bool> {
        let open: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT ended_at FROM numbering_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(matches!(open, Some(None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_start_and_end() {
        let db = Database::new(":memory:").await.unwrap();
        let host_id = db.hosts().upsert(1, 100, "Alice").await.unwrap();

        let session_id = db.sessions().start(1, 555, host_id, 3).await.unwrap();
        assert!(db.sessions().is_open(session_id).await.unwrap());

        db.sessions().end(session_id).await.unwrap();
        assert!(!db.sessions().is_open(session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_per_guild() {
        let db = Database::new(":memory:").await.unwrap();
        let host_id = db.hosts().upsert(1, 100, "Alice").await.unwrap();

        db.sessions().start(1, 555, host_id, 3).await.unwrap();
        db.sessions().start(1, 555, host_id, 4).await.unwrap();
        db.sessions().start(2, 777, host_id, 2).await.unwrap();

        assert_eq!(db.sessions().count(1).await.unwrap(), 2);
        assert_eq!(db.sessions().count(2).await.unwrap(), 1);
    }
}
