use poise::serenity_prelude as serenity;
use tracing::info;

use super::{mention, require};
use crate::permissions::RequiredLevel;
use crate::{Context, Error};

const COLOR_BLUE: u32 = 0x3498db;
const COLOR_GREEN: u32 = 0x2ecc71;

/// Example renderings for the default strip patterns shown in /settings.
fn pattern_example(pattern: &str) -> &str {
    match pattern {
        r"^\d+\.\s*" => "01. Name",
        r"^\d+\s*\|\|\s*" => "01 || Name",
        r"^\d+\s*" => "01 Name",
        r"^\d+\s*-\s*" => "01 - Name",
        r"^\[\d+\]\s*" => "[01] Name",
        other => other,
    }
}

/// Show the bot settings for this server
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn settings(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Standard).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let guild_settings = data.db.settings().get(guild_id).await?;

    let mut access_lines = Vec::new();
    if let Some(required) = &guild_settings.required_nickname {
        access_lines.push(format!("**Nickname:** contains `{}`", required));
    }
    if !guild_settings.allowed_roles.is_empty() {
        let mentions: Vec<String> = guild_settings
            .allowed_roles
            .iter()
            .take(5)
            .map(|id| format!("<@&{}>", id))
            .collect();
        access_lines.push(format!("**Roles:** {}", mentions.join(", ")));
        if guild_settings.allowed_roles.len() > 5 {
            access_lines.push(format!(
                "*...and {} more*",
                guild_settings.allowed_roles.len() - 5
            ));
        }
    }
    let access = if access_lines.is_empty() {
        "*Administrators only*".to_string()
    } else {
        access_lines.join("\n")
    };

    let mut format_lines: Vec<String> = data
        .config
        .number_formats
        .iter()
        .take(3)
        .map(|p| format!("- `{}`", pattern_example(p)))
        .collect();
    if data.config.number_formats.len() > 3 {
        format_lines.push(format!(
            "*...and {} more*",
            data.config.number_formats.len() - 3
        ));
    }

    let features = format!(
        "{} Host auto-saving",
        if data.config.features.auto_save_hosts {
            "[on]"
        } else {
            "[off]"
        }
    );

    let embed = serenity::CreateEmbed::new()
        .title("Server settings")
        .description(
            ctx.guild()
                .map(|g| g.name.clone())
                .unwrap_or_else(|| guild_id.to_string()),
        )
        .field("Access", access, true)
        .field("Number formats", format_lines.join("\n"), false)
        .field("Features", features, false)
        .color(COLOR_BLUE);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show numbering statistics for this server
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn stats(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let stats = ctx.data().db.statistics(guild_id.get()).await?;

    let mut embed = serenity::CreateEmbed::new()
        .title("Server statistics")
        .field(
            "Totals",
            format!(
                "Sessions run: **{}**\nActive hosts: **{}**",
                stats.total_sessions, stats.active_hosts
            ),
            false,
        )
        .color(COLOR_BLUE);

    if !stats.top_hosts.is_empty() {
        let lines: Vec<String> = stats
            .top_hosts
            .iter()
            .enumerate()
            .map(|(i, host)| {
                format!(
                    "{}. **{}** - {} {}",
                    i + 1,
                    host.nickname,
                    host.sessions_count,
                    if host.sessions_count == 1 {
                        "session"
                    } else {
                        "sessions"
                    }
                )
            })
            .collect();
        embed = embed.field("Top hosts", lines.join("\n"), false);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Export this server's settings and access lists as JSON
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn export(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Standard).await? else {
        return Ok(());
    };
    let guild_id = actor.guild.as_ref().map(|g| g.guild_id).unwrap_or_default();

    let data = ctx.data();
    let guild_settings = data.db.settings().get(guild_id).await?;
    let grants = data.db.authorized().list(guild_id).await?;
    let hosts = data.db.hosts().list_active(guild_id).await?;

    let now = chrono::Utc::now();
    let export = serde_json::json!({
        "guild_id": guild_id,
        "export_date": now.to_rfc3339(),
        "settings": guild_settings,
        "authorized_users": grants.iter().map(|g| serde_json::json!({
            "user_id": g.user_id,
            "role": g.role,
            "added_by": g.added_by,
            "added_at": g.added_at,
        })).collect::<Vec<_>>(),
        "hosts": hosts.iter().map(|h| serde_json::json!({
            "user_id": h.user_id,
            "nickname": h.nickname,
            "sessions_count": h.sessions_count,
            "last_session": h.last_session,
        })).collect::<Vec<_>>(),
    });
    let content = serde_json::to_vec_pretty(&export)?;

    data.db
        .audit()
        .append(guild_id, actor.user_id, "export_settings", "Exported server settings")
        .await?;

    info!(guild_id, "Settings exported by {}", mention(actor.user_id));

    let filename = format!("settings_{}_{}.json", guild_id, now.format("%Y%m%d_%H%M%S"));
    let attachment = serenity::CreateAttachment::bytes(content, filename);
    let embed = serenity::CreateEmbed::new()
        .title("Settings export")
        .description("Server settings exported as a JSON file.")
        .color(COLOR_GREEN);

    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .attachment(attachment),
    )
    .await?;
    Ok(())
}
