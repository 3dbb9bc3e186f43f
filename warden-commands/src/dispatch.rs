use poise::serenity_prelude as serenity;

use warden_core::dispatcher::render;
use warden_core::registry::split_args;
use warden_core::{ChannelId, CommandInvocation, CommandResult, Context, Error, GuildId, UserId};
use warden_utils::embed::notice_embed;

pub const GUILD_ONLY_MESSAGE: &str = "This command only works in servers.";

/// Hand a framework command over to the moderation engine and reply with the outcome.
pub(crate) async fn forward(
    ctx: Context<'_>,
    name: &str,
    args: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(GUILD_ONLY_MESSAGE).await?;
        return Ok(());
    };

    let invocation = invocation_for(
        name,
        args.as_deref(),
        guild_id,
        ctx.channel_id(),
        ctx.author().id,
    );
    let result = ctx.data().moderator.on_command(&invocation).await;

    match reply_embed(&result) {
        Some(embed) => {
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        None => {
            ctx.say(render(&result)).await?;
        }
    }

    Ok(())
}

pub fn invocation_for(
    name: &str,
    args: Option<&str>,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
    author_id: serenity::UserId,
) -> CommandInvocation {
    CommandInvocation {
        name: name.to_owned(),
        args: split_args(args),
        actor: UserId::new(author_id.get()),
        guild: GuildId::new(guild_id.get()),
        channel: ChannelId::new(channel_id.get()),
    }
}

/// Successful multi-line reports render as embeds; everything else stays plain text.
pub fn reply_embed(result: &CommandResult) -> Option<serenity::CreateEmbed> {
    let report = result.as_ref().ok()?;
    let text = report.render();
    text.trim().contains('\n').then(|| notice_embed(&text))
}
