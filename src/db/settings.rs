use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

use super::now_timestamp;
use crate::error::Result;

/// Per-guild settings, stored as a JSON blob in the guilds table.
///
/// The shape is closed: unknown keys fail parsing and the row falls back
/// to defaults, so the permission resolver's contract stays testable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuildSettings {
    /// Substring a member's display name must contain (case-insensitive)
    /// to pass the nickname access rule
    pub required_nickname: Option<String>,

    /// Discord role ids whose holders pass the role access rule
    pub allowed_roles: Vec<u64>,
}

/// Repository for guild rows and their settings blob.
pub struct GuildSettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GuildSettingsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Make sure a guild row exists. No-op if it already does.
    pub async fn ensure_guild(&self, guild_id: u64, guild_name: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO guilds (guild_id, guild_name, joined_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(guild_name)
        .bind(now_timestamp())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch settings for a guild, defaulting when the guild is unknown
    /// or its stored blob does not parse.
    pub async fn get(&self, guild_id: u64) -> Result<GuildSettings> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT settings FROM guilds WHERE guild_id = ?")
                .bind(guild_id as i64)
                .fetch_optional(self.pool)
                .await?;

        let Some(raw) = row else {
            return Ok(GuildSettings::default());
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(
                    guild_id,
                    error = %e,
                    "Stored guild settings did not parse, using defaults"
                );
                Ok(GuildSettings::default())
            }
        }
    }

    /// Store settings for a guild, creating the guild row if needed.
    pub async fn put(&self, guild_id: u64, settings: &GuildSettings) -> Result<()> {
        self.ensure_guild(guild_id, None).await?;

        let raw = serde_json::to_string(settings)?;
        sqlx::query("UPDATE guilds SET settings = ? WHERE guild_id = ?")
            .bind(raw)
            .bind(guild_id as i64)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_get_defaults_for_unknown_guild() {
        let db = Database::new(":memory:").await.unwrap();
        let settings = db.settings().get(1).await.unwrap();
        assert_eq!(settings, GuildSettings::default());
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let db = Database::new(":memory:").await.unwrap();
        let settings = GuildSettings {
            required_nickname: Some("Team".to_string()),
            allowed_roles: vec![10, 20],
        };
        db.settings().put(42, &settings).await.unwrap();

        let loaded = db.settings().get(42).await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_defaults() {
        let db = Database::new(":memory:").await.unwrap();
        db.settings().ensure_guild(7, Some("guild")).await.unwrap();
        sqlx::query("UPDATE guilds SET settings = ? WHERE guild_id = ?")
            .bind(r#"{"unexpected_key": true}"#)
            .bind(7i64)
            .execute(db.pool())
            .await
            .unwrap();

        let settings = db.settings().get(7).await.unwrap();
        assert_eq!(settings, GuildSettings::default());
    }

    #[tokio::test]
    async fn test_ensure_guild_is_idempotent() {
        let db = Database::new(":memory:").await.unwrap();
        db.settings().ensure_guild(5, Some("a")).await.unwrap();
        db.settings().ensure_guild(5, Some("b")).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM guilds")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
