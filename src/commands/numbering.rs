use poise::serenity_prelude as serenity;
use tracing::info;

use super::{mention, require};
use crate::permissions::RequiredLevel;
use crate::platform::DiscordPlatform;
use crate::session::{Participant, RenameOutcome};
use crate::{Context, Error};

const COLOR_GREEN: u32 = 0x2ecc71;
const COLOR_ORANGE: u32 = 0xe67e22;
const COLOR_BLUE: u32 = 0x3498db;

/// Snapshot of the author's voice channel taken from the gateway cache.
struct VoiceChannelSnapshot {
    channel_id: u64,
    channel_name: String,
    participants: Vec<Participant>,
}

/// Collect the members of the author's current voice channel, in cache
/// order. Returns None when the author is not in a voice channel.
fn voice_channel_snapshot(
    ctx: &Context<'_>,
    include_author: bool,
) -> Result<Option<VoiceChannelSnapshot>, Error> {
    let guild = ctx.guild().ok_or("Guild not available in cache")?;
    let author_id = ctx.author().id;

    let Some(channel_id) = guild
        .voice_states
        .get(&author_id)
        .and_then(|vs| vs.channel_id)
    else {
        return Ok(None);
    };

    let channel_name = guild
        .channels
        .get(&channel_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| channel_id.to_string());

    let mut participants = Vec::new();
    for (user_id, voice_state) in &guild.voice_states {
        if voice_state.channel_id != Some(channel_id) {
            continue;
        }
        if !include_author && *user_id == author_id {
            continue;
        }
        if let Some(member) = guild.members.get(user_id) {
            participants.push(Participant {
                user_id: user_id.get(),
                display_name: member.display_name().to_string(),
                username: member.user.name.clone(),
            });
        }
    }

    Ok(Some(VoiceChannelSnapshot {
        channel_id: channel_id.get(),
        channel_name,
        participants,
    }))
}

/// Assign random numbers to everyone in your voice channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn number(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Host).await? else {
        return Ok(());
    };
    let Some(guild_actor) = actor.guild.clone() else {
        return Ok(());
    };

    let Some(snapshot) = voice_channel_snapshot(&ctx, false)? else {
        ctx.send(
            poise::CreateReply::default()
                .content("You must be in a voice channel to use this command.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    if snapshot.participants.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("There are no other participants in the channel to number.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    // Renames are sequential platform round-trips; defer so the
    // interaction doesn't time out on large channels.
    ctx.defer().await?;

    let data = ctx.data();
    data.db
        .audit()
        .append(
            guild_actor.guild_id,
            actor.user_id,
            "number_command",
            &format!(
                "Channel: {}, participants: {}",
                snapshot.channel_name,
                snapshot.participants.len()
            ),
        )
        .await?;

    let platform = DiscordPlatform::new(ctx.serenity_context().http.clone());
    let report = data
        .coordinator
        .start_numbering(
            &platform,
            guild_actor.guild_id,
            snapshot.channel_id,
            actor.user_id,
            &guild_actor.display_name,
            &snapshot.participants,
        )
        .await?;

    info!(
        guild_id = guild_actor.guild_id,
        "Numbering by {}: {}/{} succeeded",
        ctx.author().name,
        report.success_count,
        report.participant_count
    );

    let needs_manual: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.outcome != RenameOutcome::Renamed)
        .collect();

    let mut result_lines: Vec<String> = report
        .outcomes
        .iter()
        .take(10)
        .map(|o| {
            let suffix = match o.outcome {
                RenameOutcome::Renamed => "",
                RenameOutcome::NeedsManual => " *(insufficient permissions)*",
                RenameOutcome::Failed => " *(error)*",
            };
            format!("{} -> **{}**{}", o.old_name, o.new_name, suffix)
        })
        .collect();
    if report.outcomes.len() > 10 {
        result_lines.push(format!(
            "*...and {} more participants*",
            report.outcomes.len() - 10
        ));
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Numbering results")
        .description(format!(
            "Channel: **{}**\nHost: {}\nParticipants: **{}**",
            snapshot.channel_name,
            mention(actor.user_id),
            report.participant_count
        ))
        .field(
            format!(
                "Succeeded: {}/{}",
                report.success_count, report.participant_count
            ),
            result_lines.join("\n"),
            false,
        )
        .color(if needs_manual.is_empty() {
            COLOR_GREEN
        } else {
            COLOR_ORANGE
        })
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Session #{}",
            report.session_id
        )));

    if !needs_manual.is_empty() {
        let mut manual_lines: Vec<String> = needs_manual
            .iter()
            .take(5)
            .map(|o| format!("{} -> **{}**", mention(o.user_id), o.new_name))
            .collect();
        if needs_manual.len() > 5 {
            manual_lines.push(format!("*...and {} more*", needs_manual.len() - 5));
        }
        embed = embed.field(
            "Needs manual rename:",
            manual_lines.join("\n"),
            false,
        );
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove assigned numbers from nicknames in your voice channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn clear(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Host).await? else {
        return Ok(());
    };
    let Some(guild_actor) = actor.guild.clone() else {
        return Ok(());
    };

    let Some(snapshot) = voice_channel_snapshot(&ctx, true)? else {
        ctx.send(
            poise::CreateReply::default()
                .content("You must be in a voice channel to use this command.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    ctx.defer().await?;

    let data = ctx.data();
    data.db
        .audit()
        .append(
            guild_actor.guild_id,
            actor.user_id,
            "clear_command",
            &format!("Channel: {}", snapshot.channel_name),
        )
        .await?;

    let platform = DiscordPlatform::new(ctx.serenity_context().http.clone());
    let report = data
        .coordinator
        .clear_numbers(&platform, guild_actor.guild_id, &snapshot.participants)
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("Numbers cleared")
        .description(format!("Channel: **{}**", snapshot.channel_name))
        .field(
            "Result",
            format!(
                "Inspected: **{}** participants\nRenamed: **{}/{}** nicknames",
                report.inspected, report.renamed, report.changed
            ),
            false,
        )
        .color(if report.renamed == report.changed {
            COLOR_GREEN
        } else {
            COLOR_ORANGE
        });

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the hosts who have run numbering sessions on this server
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn hosts(ctx: Context<'_>) -> Result<(), Error> {
    let Some(actor) = require(&ctx, RequiredLevel::Standard).await? else {
        return Ok(());
    };
    let Some(guild_actor) = actor.guild else {
        return Ok(());
    };

    let hosts = ctx.data().db.hosts().list_active(guild_actor.guild_id).await?;

    if hosts.is_empty() {
        ctx.send(
            poise::CreateReply::default()
                .content("No hosts have been recorded on this server yet."),
        )
        .await?;
        return Ok(());
    }

    let lines: Vec<String> = hosts
        .iter()
        .take(10)
        .enumerate()
        .map(|(i, host)| {
            format!(
                "{}. {} - **{}** {}",
                i + 1,
                mention(host.user_id),
                host.sessions_count,
                if host.sessions_count == 1 {
                    "session"
                } else {
                    "sessions"
                }
            )
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("Server hosts")
        .description(format!("Total hosts: **{}**", hosts.len()))
        .field("Top hosts", lines.join("\n"), false)
        .color(COLOR_BLUE);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
