//! Permission resolution for bot commands.
//!
//! Every command handler asks the resolver one question up front: may this
//! actor run a command of this level in this guild? The resolver only
//! reads; it never talks to Discord itself. The command layer captures a
//! snapshot of the platform-side facts (ownership, administrator bit,
//! display name, role ids) before asking.

use std::sync::Arc;
use tracing::debug;

use crate::config::BotConfig;
use crate::db::{AuthRole, Database};
use crate::error::Result;

/// Minimum permission tier a command demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredLevel {
    Standard,
    Host,
    Admin,
}

/// Platform-side facts about an actor inside a guild, captured by the
/// command layer from the gateway cache.
#[derive(Debug, Clone)]
pub struct GuildActor {
    pub guild_id: u64,
    pub is_owner: bool,
    pub has_admin_permission: bool,
    pub display_name: String,
    pub role_ids: Vec<u64>,
}

/// An actor invoking a command. `guild` is None in direct messages, in
/// which case only the global checks apply.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: u64,
    pub guild: Option<GuildActor>,
}

/// Decides whether an actor may invoke a command of a given level.
///
/// Resolution order, first match wins:
/// 1. global admin allowlist
/// 2. guild owner
/// 3. Discord administrator permission
/// 4. explicit authorization grant (admin grants everything; moderator
///    and host grant Standard and Host)
/// 5. required-nickname substring match (never for Admin)
/// 6. allowed-role membership (never for Admin)
///
/// Admin-level actions can only be reached through steps 1-4 with an
/// `admin` grant, so a renamable display name or an assignable role can
/// never escalate into authorization management.
pub struct PermissionResolver {
    config: Arc<BotConfig>,
    db: Database,
}

impl PermissionResolver {
    pub fn new(config: Arc<BotConfig>, db: Database) -> Self {
        Self { config, db }
    }

    pub async fn resolve(&self, actor: &Actor, required: RequiredLevel) -> Result<bool> {
        // With host auto-saving disabled there is no host bookkeeping to
        // protect, so host commands only need standard access.
        let required = if required == RequiredLevel::Host && !self.config.features.auto_save_hosts {
            RequiredLevel::Standard
        } else {
            required
        };

        if self.config.is_global_admin(actor.user_id) {
            debug!(user_id = actor.user_id, "granted: global admin");
            return Ok(true);
        }

        let Some(guild) = &actor.guild else {
            debug!(user_id = actor.user_id, "denied: no guild context");
            return Ok(false);
        };

        if guild.is_owner {
            debug!(user_id = actor.user_id, "granted: guild owner");
            return Ok(true);
        }

        if guild.has_admin_permission {
            debug!(user_id = actor.user_id, "granted: guild administrator");
            return Ok(true);
        }

        if let Some(grant) = self.db.authorized().find(guild.guild_id, actor.user_id).await? {
            match grant.role {
                AuthRole::Admin => {
                    debug!(user_id = actor.user_id, "granted: admin grant");
                    return Ok(true);
                }
                AuthRole::Moderator | AuthRole::Host if required != RequiredLevel::Admin => {
                    debug!(
                        user_id = actor.user_id,
                        role = %grant.role,
                        "granted: authorization grant"
                    );
                    return Ok(true);
                }
                _ => {}
            }
        }

        // Nickname and role heuristics never satisfy Admin.
        if required == RequiredLevel::Admin {
            debug!(user_id = actor.user_id, "denied: admin level requested");
            return Ok(false);
        }

        let settings = self.db.settings().get(guild.guild_id).await?;

        if let Some(required_nickname) = &settings.required_nickname {
            if guild
                .display_name
                .to_lowercase()
                .contains(&required_nickname.to_lowercase())
            {
                debug!(user_id = actor.user_id, "granted: nickname match");
                return Ok(true);
            }
        }

        if guild
            .role_ids
            .iter()
            .any(|id| settings.allowed_roles.contains(id))
        {
            debug!(user_id = actor.user_id, "granted: allowed role");
            return Ok(true);
        }

        debug!(user_id = actor.user_id, "denied: no rule matched");
        Ok(false)
    }
}
