use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Why a rename attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameError {
    /// The platform refused the rename (role hierarchy, owner, missing
    /// MANAGE_NICKNAMES). Expected and common; the member needs a manual
    /// rename.
    PermissionDenied,
    /// Anything else: rate limits, network, unknown member.
    Other(String),
}

impl std::fmt::Display for RenameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenameError::PermissionDenied => f.write_str("permission denied"),
            RenameError::Other(msg) => f.write_str(msg),
        }
    }
}

/// The slice of the chat platform the session coordinator needs: renaming
/// guild members. Commands capture everything else (voice channel rosters,
/// member snapshots) from the gateway cache before calling in.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn rename(
        &self,
        guild_id: u64,
        user_id: u64,
        new_nick: &str,
    ) -> std::result::Result<(), RenameError>;
}

/// Production implementation over the serenity HTTP client.
pub struct DiscordPlatform {
    http: Arc<serenity::Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PlatformClient for DiscordPlatform {
    async fn rename(
        &self,
        guild_id: u64,
        user_id: u64,
        new_nick: &str,
    ) -> std::result::Result<(), RenameError> {
        let builder = serenity::EditMember::new().nickname(new_nick);
        serenity::GuildId::new(guild_id)
            .edit_member(&self.http, serenity::UserId::new(user_id), builder)
            .await
            .map(|_| ())
            .map_err(classify_error)
    }
}

fn classify_error(err: serenity::Error) -> RenameError {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(ref resp)) = err {
        if resp.status_code.as_u16() == 403 {
            return RenameError::PermissionDenied;
        }
    }
    RenameError::Other(err.to_string())
}
