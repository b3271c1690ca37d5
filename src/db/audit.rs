use sqlx::SqlitePool;

use super::now_timestamp;
use crate::error::Result;

/// One append-only audit trail entry.
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub log_id: i64,
    pub user_id: u64,
    pub action: String,
    pub details: String,
    pub timestamp: i64,
}

/// Repository for the action log. Append and read only.
pub struct AuditLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditLogRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        guild_id: u64,
        user_id: u64,
        action: &str,
        details: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO action_logs (guild_id, user_id, action, details, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(action)
        .bind(details)
        .bind(now_timestamp())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Most recent entries for a guild, newest first.
    pub async fn recent(&self, guild_id: u64, limit: usize) -> Result<Vec<ActionLogEntry>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String, i64)>(
            r#"
            SELECT log_id, user_id, action, details, timestamp
            FROM action_logs
            WHERE guild_id = ?
            ORDER BY log_id DESC
            LIMIT ?
            "#,
        )
        .bind(guild_id as i64)
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(log_id, user_id, action, details, timestamp)| ActionLogEntry {
                log_id,
                user_id: user_id as u64,
                action,
                details,
                timestamp,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_append_and_recent_order() {
        let db = Database::new(":memory:").await.unwrap();
        db.audit().append(1, 100, "first", "a").await.unwrap();
        db.audit().append(1, 100, "second", "b").await.unwrap();
        db.audit().append(1, 200, "third", "").await.unwrap();

        let entries = db.audit().recent(1, 10).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "third");
        assert_eq!(entries[2].action, "first");
    }

    #[tokio::test]
    async fn test_recent_respects_limit_and_guild() {
        let db = Database::new(":memory:").await.unwrap();
        for i in 0..5 {
            db.audit()
                .append(1, 100, &format!("action_{}", i), "")
                .await
                .unwrap();
        }
        db.audit().append(2, 100, "other_guild", "").await.unwrap();

        let entries = db.audit().recent(1, 2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "action_4");
        assert!(entries.iter().all(|e| e.action != "other_guild"));
    }
}
