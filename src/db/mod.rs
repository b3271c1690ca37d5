//! Persistent storage over async SQLite.
//!
//! A single connection pool is shared by repository structs that each own
//! one table's queries: guild settings, authorization grants, host stats,
//! numbering sessions and the audit log.

pub mod audit;
pub mod authorized;
pub mod hosts;
pub mod sessions;
pub mod settings;

pub use audit::{ActionLogEntry, AuditLogRepository};
pub use authorized::{AuthRole, AuthorizationGrant, AuthorizationRepository};
pub use hosts::{Host, HostRepository};
pub use sessions::SessionRepository;
pub use settings::{GuildSettings, GuildSettingsRepository};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

use crate::error::Result;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) the database and run migrations.
    ///
    /// `":memory:"` opens a uniquely named shared-cache memory database;
    /// a plain `file::memory:` URI collides across parallel tests.
    pub async fn new(path: &str) -> Result<Self> {
        let pool = if path == ":memory:" {
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:rollcall-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(
                            path = %parent.display(),
                            error = %e,
                            "Failed to create database directory"
                        );
                    }
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL mode allows reads to happen while writes are in progress
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Guild settings repository.
    pub fn settings(&self) -> GuildSettingsRepository<'_> {
        GuildSettingsRepository::new(&self.pool)
    }

    /// Authorization grant repository.
    pub fn authorized(&self) -> AuthorizationRepository<'_> {
        AuthorizationRepository::new(&self.pool)
    }

    /// Host statistics repository.
    pub fn hosts(&self) -> HostRepository<'_> {
        HostRepository::new(&self.pool)
    }

    /// Numbering session repository.
    pub fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.pool)
    }

    /// Audit log repository.
    pub fn audit(&self) -> AuditLogRepository<'_> {
        AuditLogRepository::new(&self.pool)
    }

    /// Aggregate per-guild statistics for the /stats command.
    pub async fn statistics(&self, guild_id: u64) -> Result<GuildStatistics> {
        let total_sessions = self.sessions().count(guild_id).await?;
        let mut top_hosts = self.hosts().list_active(guild_id).await?;
        let active_hosts = top_hosts.len();
        top_hosts.truncate(5);

        Ok(GuildStatistics {
            total_sessions,
            active_hosts,
            top_hosts,
        })
    }
}

/// Aggregate statistics for one guild.
#[derive(Debug)]
pub struct GuildStatistics {
    pub total_sessions: i64,
    pub active_hosts: usize,
    pub top_hosts: Vec<Host>,
}

pub(crate) fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_and_migrate() {
        let db = Database::new(":memory:").await.unwrap();
        // Tables exist after migration
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('guilds', 'authorized_users', 'hosts', 'numbering_sessions', 'action_logs')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_statistics_empty_guild() {
        let db = Database::new(":memory:").await.unwrap();
        let stats = db.statistics(1).await.unwrap();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.active_hosts, 0);
        assert!(stats.top_hosts.is_empty());
    }
}
