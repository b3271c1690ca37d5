use sqlx::SqlitePool;

use super::now_timestamp;
use crate::error::Result;

/// A user who has run at least one numbering session in a guild.
#[derive(Debug, Clone)]
pub struct Host {
    pub host_id: i64,
    pub guild_id: u64,
    pub user_id: u64,
    pub nickname: String,
    pub sessions_count: i64,
    pub last_session: Option<i64>,
}

/// Repository for host statistics.
pub struct HostRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HostRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a host on first sight, or refresh the stored nickname and
    /// reactivate on later sightings. Returns the host id either way.
    pub async fn upsert(&self, guild_id: u64, user_id: u64, nickname: &str) -> Result<i64> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT host_id FROM hosts WHERE guild_id = ? AND user_id = ?",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(self.pool)
        .await?;

        if let Some(host_id) = existing {
            sqlx::query("UPDATE hosts SET nickname = ?, is_active = 1 WHERE host_id = ?")
                .bind(nickname)
                .bind(host_id)
                .execute(self.pool)
                .await?;
            return Ok(host_id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO hosts (guild_id, user_id, nickname, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(nickname)
        .bind(now_timestamp())
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Bump the session counter and stamp the last session time.
    pub async fn increment_session(&self, host_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE hosts
            SET sessions_count = sessions_count + 1, last_session = ?
            WHERE host_id = ?
            "#,
        )
        .bind(now_timestamp())
        .bind(host_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Active hosts of a guild, most sessions first.
    pub async fn list_active(&self, guild_id: u64) -> Result<Vec<Host>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, i64, Option<i64>)>(
            r#"
            SELECT host_id, user_id, nickname, sessions_count, last_session
            FROM hosts
            WHERE guild_id = ? AND is_active = 1
            ORDER BY sessions_count DESC
            "#,
        )
        .bind(guild_id as i64)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(host_id, user_id, nickname, sessions_count, last_session)| Host {
                    host_id,
                    guild_id,
                    user_id: user_id as u64,
                    nickname,
                    sessions_count,
                    last_session,
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_upsert_creates_then_reuses() {
        let db = Database::new(":memory:").await.unwrap();
        let first = db.hosts().upsert(1, 100, "Alice").await.unwrap();
        let second = db.hosts().upsert(1, 100, "01. Alice").await.unwrap();
        assert_eq!(first, second);

        let hosts = db.hosts().list_active(1).await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].nickname, "01. Alice");
        assert_eq!(hosts[0].sessions_count, 0);
    }

    #[tokio::test]
    async fn test_increment_session() {
        let db = Database::new(":memory:").await.unwrap();
        let host_id = db.hosts().upsert(1, 100, "Alice").await.unwrap();

        db.hosts().increment_session(host_id).await.unwrap();
        db.hosts().increment_session(host_id).await.unwrap();

        let hosts = db.hosts().list_active(1).await.unwrap();
        assert_eq!(hosts[0].sessions_count, 2);
        assert!(hosts[0].last_session.is_some());
    }

    #[tokio::test]
    async fn test_list_active_orders_by_sessions() {
        let db = Database::new(":memory:").await.unwrap();
        let a = db.hosts().upsert(1, 100, "Alice").await.unwrap();
        let b = db.hosts().upsert(1, 200, "Bob").await.unwrap();

        db.hosts().increment_session(b).await.unwrap();
        db.hosts().increment_session(b).await.unwrap();
        db.hosts().increment_session(a).await.unwrap();

        let hosts = db.hosts().list_active(1).await.unwrap();
        assert_eq!(hosts[0].user_id, 200);
        assert_eq!(hosts[1].user_id, 100);
    }
}
