use poise::serenity_prelude as serenity;
use tracing::info;

use super::{mention, require};
use crate::db::AuthRole;
use crate::permissions::RequiredLevel;
use crate::{Context, Error};

const COLOR_GREEN: u32 = 0x2ecc71;
const COLOR_BLUE: u32 = 0x3498db;

/// Grant a user access to bot commands
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn authorize(
    ctx: Context<'_>,
    #[description = "User to authorize"] user: serenity::User,
    #[description = "Role to grant: admin, moderator or host (default)"] role: Option<String>,
) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let role: AuthRole = match role.as_deref().unwrap_or("host").parse() {
        Ok(role) => role,
        Err(e) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("Invalid role: {}", e))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    let data = ctx.data();
    data.db
        .authorized()
        .upsert(guild_id, user.id.get(), role, actor.user_id)
        .await?;
    data.db
        .audit()
        .append(
            guild_id,
            actor.user_id,
            "authorize_user",
            &format!("Added {} with role {}", user.name, role),
        )
        .await?;

    info!(guild_id, "{} authorized {} as {}", ctx.author().name, user.name, role);

    let embed = serenity::CreateEmbed::new()
        .title("User authorized")
        .description(format!(
            "{} was granted the **{}** role",
            mention(user.id.get()),
            role
        ))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Revoke a user's access to bot commands
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn unauthorize(
    ctx: Context<'_>,
    #[description = "User to remove"] user: serenity::User,
) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let removed = data.db.authorized().remove(guild_id, user.id.get()).await?;

    if !removed {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("{} was not on the authorized list.", user.name))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    data.db
        .audit()
        .append(
            guild_id,
            actor.user_id,
            "unauthorize_user",
            &format!("Removed {}", user.name),
        )
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("User removed")
        .description(format!(
            "{} was removed from the authorized list",
            mention(user.id.get())
        ))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// List users with explicit access grants
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn authorized(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let grants = ctx.data().db.authorized().list(guild_id).await?;

    if grants.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("There are no authorized users on this server."),
        )
        .await?;
        return Ok(());
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Authorized users")
        .description(format!("Total: **{}**", grants.len()))
        .color(COLOR_BLUE);

    for (role, title) in [
        (AuthRole::Admin, "Admins"),
        (AuthRole::Moderator, "Moderators"),
        (AuthRole::Host, "Hosts"),
    ] {
        let members: Vec<_> = grants.iter().filter(|g| g.role == role).collect();
        if members.is_empty() {
            continue;
        }

        let mut lines: Vec<String> = members
            .iter()
            .take(10)
            .map(|g| format!("- {}", mention(g.user_id)))
            .collect();
        if members.len() > 10 {
            lines.push(format!("*...and {} more*", members.len() - 10));
        }

        embed = embed.field(title, lines.join("\n"), true);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Require a nickname substring for command access
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn setnick(
    ctx: Context<'_>,
    #[description = "Text a member's nickname must contain"]
    #[rest]
    nickname_part: String,
) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let mut settings = data.db.settings().get(guild_id).await?;
    settings.required_nickname = Some(nickname_part.clone());
    data.db.settings().put(guild_id, &settings).await?;

    data.db
        .audit()
        .append(
            guild_id,
            actor.user_id,
            "set_required_nickname",
            &format!("Set to: {}", nickname_part),
        )
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("Setting updated")
        .description(format!(
            "Required nickname part: **{}**\nMembers with this text in their nickname can now use commands.",
            nickname_part
        ))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove the nickname requirement
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn removenick(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let mut settings = data.db.settings().get(guild_id).await?;
    if settings.required_nickname.take().is_some() {
        data.db.settings().put(guild_id, &settings).await?;
    }

    ctx.send(poise::CreateReply::default().content("Nickname requirement removed."))
        .await?;
    Ok(())
}

/// Allow a role to use bot commands
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn setrole(
    ctx: Context<'_>,
    #[description = "Role to allow"] role: serenity::Role,
) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let mut settings = data.db.settings().get(guild_id).await?;

    if settings.allowed_roles.contains(&role.id.get()) {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("Role **{}** is already on the allowed list.", role.name))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    settings.allowed_roles.push(role.id.get());
    data.db.settings().put(guild_id, &settings).await?;

    data.db
        .audit()
        .append(
            guild_id,
            actor.user_id,
            "add_allowed_role",
            &format!("Added role: {}", role.name),
        )
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("Role added")
        .description(format!(
            "Members with the **{}** role can now use bot commands.",
            role.name
        ))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove a role from the allowed list
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn removerole(
    ctx: Context<'_>,
    #[description = "Role to remove"] role: serenity::Role,
) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let mut settings = data.db.settings().get(guild_id).await?;

    if !settings.allowed_roles.contains(&role.id.get()) {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("Role **{}** is not on the allowed list.", role.name))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    settings.allowed_roles.retain(|id| *id != role.id.get());
    data.db.settings().put(guild_id, &settings).await?;

    let embed = serenity::CreateEmbed::new()
        .title("Role removed")
        .description(format!(
            "Members with the **{}** role can no longer use bot commands.",
            role.name
        ))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show recent bot actions on this server
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn logs(
    ctx: Context<'_>,
    #[description = "Number of entries (1-50, default 20)"] limit: Option<usize>,
) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Admin).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let limit = limit.unwrap_or(20).clamp(1, 50);
    let entries = ctx.data().db.audit().recent(guild_id, limit).await?;

    if entries.is_empty() {
        ctx.send(poise::CreateReply::default().content("The action log is empty."))
            .await?;
        return Ok(());
    }

    let mut lines = Vec::new();
    for entry in entries.iter().take(10) {
        let when = chrono::DateTime::from_timestamp(entry.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| entry.timestamp.to_string());
        let action = entry.action.replace('_', " ");
        lines.push(format!("`{}` | {} | {}", when, mention(entry.user_id), action));
        if !entry.details.is_empty() {
            lines.push(format!("-# {}", entry.details));
        }
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Action history")
        .description(lines.join("\n"))
        .color(COLOR_BLUE);

    if entries.len() > 10 {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "Showing first 10 of {} entries",
            entries.len()
        )));
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
