//! Numbering session orchestration.
//!
//! One coordinator instance serves every guild. Rename attempts go out
//! sequentially and a failed participant never aborts the batch; partial
//! failure is the expected steady state and lives in the report, not in
//! the error channel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::BotConfig;
use crate::db::Database;
use crate::error::{BotError, Result};
use crate::numbering::{shuffled_numbers, NicknameTransformer};
use crate::platform::{PlatformClient, RenameError};

/// A voice-channel member handed in by the command layer, in the order
/// the platform supplied it.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: u64,
    pub display_name: String,
    /// Base account name, the rename target when stripping leaves nothing.
    pub username: String,
}

/// What happened to one participant during a numbering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    /// Platform refused; the member must be renamed by hand.
    NeedsManual,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ParticipantOutcome {
    pub user_id: u64,
    pub old_name: String,
    pub new_name: String,
    pub outcome: RenameOutcome,
}

/// Result of a numbering run.
#[derive(Debug)]
pub struct NumberingReport {
    pub session_id: i64,
    pub participant_count: usize,
    pub success_count: usize,
    pub outcomes: Vec<ParticipantOutcome>,
}

/// Result of a clearing run.
#[derive(Debug)]
pub struct ClearReport {
    pub inspected: usize,
    pub changed: usize,
    pub renamed: usize,
    pub ended_session: Option<i64>,
}

/// Orchestrates numbering and clearing runs, and tracks the current
/// session per guild. The tracked index is in-memory only and resets on
/// restart; storage keeps the durable record.
pub struct SessionCoordinator {
    db: Database,
    transformer: NicknameTransformer,

    /// guild_id -> session_id of the tracked open session
    active_sessions: DashMap<u64, i64>,

    /// Serializes start/clear per guild; overlapping command events for
    /// the same guild would otherwise race on the tracked index.
    guild_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl SessionCoordinator {
    pub fn new(config: &BotConfig, db: Database) -> Result<Self> {
        let transformer = NicknameTransformer::new(&config.number_formats, config.number_width)?;
        Ok(Self {
            db,
            transformer,
            active_sessions: DashMap::new(),
            guild_locks: DashMap::new(),
        })
    }

    pub fn transformer(&self) -> &NicknameTransformer {
        &self.transformer
    }

    /// Session id currently tracked for a guild, if any.
    pub fn tracked_session(&self, guild_id: u64) -> Option<i64> {
        self.active_sessions.get(&guild_id).map(|entry| *entry)
    }

    fn guild_lock(&self, guild_id: u64) -> Arc<Mutex<()>> {
        self.guild_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Assign shuffled numbers to the given participants and record the
    /// session. Participants must already exclude the host.
    pub async fn start_numbering(
        &self,
        platform: &dyn PlatformClient,
        guild_id: u64,
        channel_id: u64,
        host_user_id: u64,
        host_display_name: &str,
        participants: &[Participant],
    ) -> Result<NumberingReport> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        if participants.is_empty() {
            return Err(BotError::NoParticipants);
        }

        let numbers = shuffled_numbers(participants.len());

        let mut outcomes = Vec::with_capacity(participants.len());
        let mut success_count = 0;

        for (participant, number) in participants.iter().zip(numbers.iter()) {
            let new_name = self.transformer.apply(&participant.display_name, *number);

            let outcome = match platform
                .rename(guild_id, participant.user_id, &new_name)
                .await
            {
                Ok(()) => {
                    info!(
                        guild_id,
                        "Renamed '{}' -> '{}'", participant.display_name, new_name
                    );
                    success_count += 1;
                    RenameOutcome::Renamed
                }
                Err(RenameError::PermissionDenied) => {
                    warn!(
                        guild_id,
                        user_id = participant.user_id,
                        "Cannot rename '{}': permission denied",
                        participant.display_name
                    );
                    RenameOutcome::NeedsManual
                }
                Err(RenameError::Other(e)) => {
                    error!(
                        guild_id,
                        user_id = participant.user_id,
                        error = %e,
                        "Failed to rename '{}'",
                        participant.display_name
                    );
                    RenameOutcome::Failed
                }
            };

            outcomes.push(ParticipantOutcome {
                user_id: participant.user_id,
                old_name: participant.display_name.clone(),
                new_name,
                outcome,
            });
        }

        let host_id = self
            .db
            .hosts()
            .upsert(guild_id, host_user_id, host_display_name)
            .await?;
        self.db.hosts().increment_session(host_id).await?;

        // Close the previously tracked session before overwriting, so
        // back-to-back /number runs don't leak open sessions in storage.
        if let Some((_, prior)) = self.active_sessions.remove(&guild_id) {
            self.db.sessions().end(prior).await?;
        }

        let session_id = self
            .db
            .sessions()
            .start(guild_id, channel_id, host_id, participants.len())
            .await?;
        self.active_sessions.insert(guild_id, session_id);

        info!(
            guild_id,
            session_id,
            "Numbering session started: {}/{} renamed",
            success_count,
            participants.len()
        );

        Ok(NumberingReport {
            session_id,
            participant_count: participants.len(),
            success_count,
            outcomes,
        })
    }

    /// Strip numeric prefixes from the given participants and end the
    /// tracked session, if any. Members whose name needs no change are
    /// inspected but not attempted.
    pub async fn clear_numbers(
        &self,
        platform: &dyn PlatformClient,
        guild_id: u64,
        participants: &[Participant],
    ) -> Result<ClearReport> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let mut changed = 0;
        let mut renamed = 0;

        for participant in participants {
            let stripped = self.transformer.strip(&participant.display_name);
            if stripped == participant.display_name {
                continue;
            }
            changed += 1;

            let target = if stripped.is_empty() {
                participant.username.as_str()
            } else {
                stripped.as_str()
            };

            match platform.rename(guild_id, participant.user_id, target).await {
                Ok(()) => {
                    info!(
                        guild_id,
                        "Cleared '{}' -> '{}'", participant.display_name, target
                    );
                    renamed += 1;
                }
                Err(RenameError::PermissionDenied) => {
                    warn!(
                        guild_id,
                        user_id = participant.user_id,
                        "Cannot clear '{}': permission denied",
                        participant.display_name
                    );
                }
                Err(RenameError::Other(e)) => {
                    error!(
                        guild_id,
                        user_id = participant.user_id,
                        error = %e,
                        "Failed to clear '{}'",
                        participant.display_name
                    );
                }
            }
        }

        let ended_session = self.active_sessions.remove(&guild_id).map(|(_, id)| id);
        if let Some(session_id) = ended_session {
            self.db.sessions().end(session_id).await?;
            info!(guild_id, session_id, "Numbering session ended");
        }

        Ok(ClearReport {
            inspected: participants.len(),
            changed,
            renamed,
            ended_session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    const GUILD: u64 = 1;
    const CHANNEL: u64 = 555;
    const HOST: u64 = 42;

    /// Scripted platform: renames succeed unless the user id is listed.
    #[derive(Default)]
    struct MockPlatform {
        deny: HashSet<u64>,
        fail: HashSet<u64>,
        calls: std::sync::Mutex<Vec<(u64, String)>>,
    }

    impl MockPlatform {
        fn calls(&self) -> Vec<(u64, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlatformClient for MockPlatform {
        async fn rename(
            &self,
            _guild_id: u64,
            user_id: u64,
            new_nick: &str,
        ) -> std::result::Result<(), RenameError> {
            self.calls
                .lock()
                .unwrap()
                .push((user_id, new_nick.to_string()));
            if self.deny.contains(&user_id) {
                return Err(RenameError::PermissionDenied);
            }
            if self.fail.contains(&user_id) {
                return Err(RenameError::Other("boom".to_string()));
            }
            Ok(())
        }
    }

    fn participant(user_id: u64, name: &str) -> Participant {
        Participant {
            user_id,
            display_name: name.to_string(),
            username: format!("user{}", user_id),
        }
    }

    async fn coordinator() -> SessionCoordinator {
        let db = Database::new(":memory:").await.unwrap();
        SessionCoordinator::new(&BotConfig::default(), db).unwrap()
    }

    #[tokio::test]
    async fn test_start_numbering_happy_path() {
        let coordinator = coordinator().await;
        let platform = MockPlatform::default();
        let participants = vec![
            participant(100, "Alice"),
            participant(200, "05. Bob"),
            participant(300, "Carol"),
        ];

        let report = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &participants)
            .await
            .unwrap();

        assert_eq!(report.participant_count, 3);
        assert_eq!(report.success_count, 3);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.outcome == RenameOutcome::Renamed));

        // Every new name carries a zero-padded prefix and the assigned
        // numbers are a permutation of 1..=3.
        let mut assigned: Vec<usize> = report
            .outcomes
            .iter()
            .map(|o| o.new_name.split('.').next().unwrap().parse().unwrap())
            .collect();
        assigned.sort_unstable();
        assert_eq!(assigned, vec![1, 2, 3]);

        // The already-numbered participant was renumbered, not stacked.
        let bob = &report.outcomes[1];
        assert!(bob.new_name.ends_with(". Bob"));

        assert_eq!(coordinator.tracked_session(GUILD), Some(report.session_id));
        assert!(coordinator
            .db
            .sessions()
            .is_open(report.session_id)
            .await
            .unwrap());

        let hosts = coordinator.db.hosts().list_active(GUILD).await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].sessions_count, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_continues_batch() {
        let coordinator = coordinator().await;
        let mut platform = MockPlatform::default();
        platform.deny.insert(200);

        let participants = vec![
            participant(100, "Alice"),
            participant(200, "Bob"),
            participant(300, "Carol"),
        ];

        let report = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &participants)
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.outcomes[1].outcome, RenameOutcome::NeedsManual);
        // The computed target name is still reported for manual fixup.
        assert!(report.outcomes[1].new_name.ends_with(". Bob"));
        // Carol was processed after the failure.
        assert_eq!(platform.calls().len(), 3);
        assert_eq!(report.outcomes[2].outcome, RenameOutcome::Renamed);
    }

    #[tokio::test]
    async fn test_other_errors_are_reported_distinctly() {
        let coordinator = coordinator().await;
        let mut platform = MockPlatform::default();
        platform.fail.insert(100);

        let participants = vec![participant(100, "Alice"), participant(200, "Bob")];
        let report = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &participants)
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].outcome, RenameOutcome::Failed);
        assert_eq!(report.success_count, 1);
    }

    #[tokio::test]
    async fn test_empty_participants_is_an_error() {
        let coordinator = coordinator().await;
        let platform = MockPlatform::default();
        let result = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &[])
            .await;
        assert!(matches!(result, Err(BotError::NoParticipants)));
        assert!(coordinator.tracked_session(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_restart_closes_prior_session() {
        let coordinator = coordinator().await;
        let platform = MockPlatform::default();
        let participants = vec![participant(100, "Alice")];

        let first = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &participants)
            .await
            .unwrap();
        let second = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &participants)
            .await
            .unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert!(!coordinator
            .db
            .sessions()
            .is_open(first.session_id)
            .await
            .unwrap());
        assert!(coordinator
            .db
            .sessions()
            .is_open(second.session_id)
            .await
            .unwrap());
        assert_eq!(coordinator.tracked_session(GUILD), Some(second.session_id));
    }

    #[tokio::test]
    async fn test_clear_skips_unchanged_names() {
        let coordinator = coordinator().await;
        let platform = MockPlatform::default();
        let participants = vec![participant(100, "Alice"), participant(200, "Bob")];

        let report = coordinator
            .clear_numbers(&platform, GUILD, &participants)
            .await
            .unwrap();

        assert_eq!(report.inspected, 2);
        assert_eq!(report.changed, 0);
        assert_eq!(report.renamed, 0);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clear_strips_and_ends_session() {
        let coordinator = coordinator().await;
        let platform = MockPlatform::default();

        let numbered = vec![participant(100, "Alice")];
        let report = coordinator
            .start_numbering(&platform, GUILD, CHANNEL, HOST, "Host", &numbered)
            .await
            .unwrap();
        let session_id = report.session_id;

        let participants = vec![
            participant(100, "01. Alice"),
            participant(200, "Bob"),
            participant(HOST, "02. Host"),
        ];
        let clear = coordinator
            .clear_numbers(&platform, GUILD, &participants)
            .await
            .unwrap();

        assert_eq!(clear.inspected, 3);
        assert_eq!(clear.changed, 2);
        assert_eq!(clear.renamed, 2);
        assert_eq!(clear.ended_session, Some(session_id));
        assert!(coordinator.tracked_session(GUILD).is_none());
        assert!(!coordinator.db.sessions().is_open(session_id).await.unwrap());

        let calls = platform.calls();
        let cleared: Vec<&str> = calls
            .iter()
            .skip(1) // first call came from start_numbering
            .map(|(_, name)| name.as_str())
            .collect();
        assert_eq!(cleared, vec!["Alice", "Host"]);
    }

    #[tokio::test]
    async fn test_clear_falls_back_to_username_when_strip_empties() {
        let coordinator = coordinator().await;
        let platform = MockPlatform::default();

        let participants = vec![participant(100, "01.")];
        let report = coordinator
            .clear_numbers(&platform, GUILD, &participants)
            .await
            .unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(platform.calls(), vec![(100, "user100".to_string())]);
    }
}
