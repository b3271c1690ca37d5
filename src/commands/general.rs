use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(poise::CreateReply::default()
        .content("Pong! Bot is working!")
        .ephemeral(true))
        .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("/number", "Assign random numbers to your voice channel (Host)", false)
        .field("/clear", "Remove assigned numbers from nicknames (Host)", false)
        .field("/hosts", "Show the host leaderboard", false)
        .field("/stats", "Show server numbering statistics", false)
        .field("/settings", "Show the bot settings for this server", false)
        .field("/export", "Export settings and access lists as JSON", false)
        .field("/authorize, /unauthorize, /authorized", "Manage access grants (Admin)", false)
        .field("/setnick, /removenick", "Manage the nickname requirement (Admin)", false)
        .field("/setrole, /removerole", "Manage allowed roles (Admin)", false)
        .field("/logs", "Show recent bot actions (Admin)", false)
        .field("/ping", "Check if the bot is running", false)
        .color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
