use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Data, Error};

/// Handle when the bot joins a new guild or starts up
pub async fn handle_guild_create(
    _ctx: &serenity::Context,
    guild: &serenity::Guild,
    data: &Data,
) -> Result<(), Error> {
    info!("Processing guild: {} ({})", guild.name, guild.id);

    data.db
        .settings()
        .ensure_guild(guild.id.get(), Some(&guild.name))
        .await?;

    Ok(())
}
