pub mod admin;
pub mod general;
pub mod numbering;
pub mod settings;

pub use admin::{
    authorize, authorized, logs, removenick, removerole, setnick, setrole, unauthorize,
};
pub use general::{help, ping};
pub use numbering::{clear, hosts, number};
pub use settings::{export, settings, stats};

use poise::serenity_prelude as serenity;

use crate::permissions::{Actor, GuildActor, RequiredLevel};
use crate::{Context, Error};

/// Capture a platform snapshot of the invoking user for the resolver.
/// Cache reads only; the guard is dropped before any await point.
pub(crate) async fn build_actor(ctx: &Context<'_>) -> Result<Actor, Error> {
    let user_id = ctx.author().id.get();

    let Some(guild_id) = ctx.guild_id() else {
        return Ok(Actor {
            user_id,
            guild: None,
        });
    };

    let member = ctx
        .author_member()
        .await
        .ok_or("Could not resolve your guild membership")?;

    let (is_owner, has_admin_permission) = {
        let guild = ctx.guild().ok_or("Guild not available in cache")?;
        let is_owner = guild.owner_id == ctx.author().id;
        #[allow(deprecated)]
        let permissions = guild.member_permissions(&member);
        (
            is_owner,
            permissions.contains(serenity::Permissions::ADMINISTRATOR),
        )
    };

    Ok(Actor {
        user_id,
        guild: Some(GuildActor {
            guild_id: guild_id.get(),
            is_owner,
            has_admin_permission,
            display_name: member.display_name().to_string(),
            role_ids: member.roles.iter().map(|r| r.get()).collect(),
        }),
    })
}

/// Resolve the actor against a required level. On denial, replies with an
/// ephemeral notice and returns None so the handler can bail out.
pub(crate) async fn require(
    ctx: &Context<'_>,
    level: RequiredLevel,
) -> Result<Option<Actor>, Error> {
    let actor = build_actor(ctx).await?;

    if ctx.data().resolver.resolve(&actor, level).await? {
        Ok(Some(actor))
    } else {
        ctx.send(
            poise::CreateReply::default()
                .content("You don't have permission to use this command.")
                .ephemeral(true),
        )
        .await?;
        Ok(None)
    }
}

/// Render a user id as a Discord mention.
pub(crate) fn mention(user_id: u64) -> String {
    format!("<@{}>", user_id)
}
