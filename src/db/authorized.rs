use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;

use super::now_timestamp;
use crate::error::Result;

/// Explicit per-guild role grant, independent of Discord permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRole {
    Admin,
    Moderator,
    Host,
}

impl AuthRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthRole::Admin => "admin",
            AuthRole::Moderator => "moderator",
            AuthRole::Host => "host",
        }
    }
}

impl fmt::Display for AuthRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(AuthRole::Admin),
            "moderator" => Ok(AuthRole::Moderator),
            "host" => Ok(AuthRole::Host),
            other => Err(format!(
                "unknown role '{}', expected admin, moderator or host",
                other
            )),
        }
    }
}

/// One row of the authorized_users table.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub user_id: u64,
    pub guild_id: u64,
    pub role: AuthRole,
    pub added_by: u64,
    pub added_at: i64,
}

/// Repository for authorization grants.
pub struct AuthorizationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuthorizationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a grant. A later grant for the same
    /// (user, guild) pair replaces the earlier one.
    pub async fn upsert(
        &self,
        guild_id: u64,
        user_id: u64,
        role: AuthRole,
        added_by: u64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO authorized_users (user_id, guild_id, role, added_by, added_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .bind(role.as_str())
        .bind(added_by as i64)
        .bind(now_timestamp())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove a grant. Returns false if none existed.
    pub async fn remove(&self, guild_id: u64, user_id: u64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM authorized_users WHERE guild_id = ? AND user_id = ?",
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All grants for a guild.
    pub async fn list(&self, guild_id: u64) -> Result<Vec<AuthorizationGrant>> {
        let rows = sqlx::query_as::<_, (i64, String, i64, i64)>(
            r#"
            SELECT user_id, role, added_by, added_at
            FROM authorized_users
            WHERE guild_id = ?
            ORDER BY added_at
            "#,
        )
        .bind(guild_id as i64)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(user_id, role, added_by, added_at)| {
                let role = role.parse().ok()?;
                Some(AuthorizationGrant {
                    user_id: user_id as u64,
                    guild_id,
                    role,
                    added_by: added_by as u64,
                    added_at,
                })
            })
            .collect())
    }

    /// Look up a single user's grant in a guild.
    pub async fn find(&self, guild_id: u64, user_id: u64) -> Result<Option<AuthorizationGrant>> {
        let row = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT role, added_by, added_at
            FROM authorized_users
            WHERE guild_id = ? AND user_id = ?
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.and_then(|(role, added_by, added_at)| {
            let role = role.parse().ok()?;
            Some(AuthorizationGrant {
                user_id,
                guild_id,
                role,
                added_by: added_by as u64,
                added_at,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_upsert_and_find() {
        let db = Database::new(":memory:").await.unwrap();
        db.authorized()
            .upsert(1, 100, AuthRole::Host, 999)
            .await
            .unwrap();

        let grant = db.authorized().find(1, 100).await.unwrap().unwrap();
        assert_eq!(grant.role, AuthRole::Host);
        assert_eq!(grant.added_by, 999);
    }

    #[tokio::test]
    async fn test_later_grant_replaces_earlier() {
        let db = Database::new(":memory:").await.unwrap();
        db.authorized()
            .upsert(1, 100, AuthRole::Host, 999)
            .await
            .unwrap();
        db.authorized()
            .upsert(1, 100, AuthRole::Admin, 999)
            .await
            .unwrap();

        let grants = db.authorized().list(1).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].role, AuthRole::Admin);
    }

    #[tokio::test]
    async fn test_remove() {
        let db = Database::new(":memory:").await.unwrap();
        db.authorized()
            .upsert(1, 100, AuthRole::Moderator, 999)
            .await
            .unwrap();

        assert!(db.authorized().remove(1, 100).await.unwrap());
        assert!(!db.authorized().remove(1, 100).await.unwrap());
        assert!(db.authorized().find(1, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grants_are_per_guild() {
        let db = Database::new(":memory:").await.unwrap();
        db.authorized()
            .upsert(1, 100, AuthRole::Host, 999)
            .await
            .unwrap();

        assert!(db.authorized().find(2, 100).await.unwrap().is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<AuthRole>().unwrap(), AuthRole::Admin);
        assert_eq!("host".parse::<AuthRole>().unwrap(), AuthRole::Host);
        assert!("owner".parse::<AuthRole>().is_err());
    }
}
