use poise::serenity_prelude as serenity;
use tracing::{debug, error};

use warden_commands::dispatch::invocation_for;
use warden_core::Data;
use warden_core::dispatcher::render;

/// Answer a prefixed message that names no registered command.
pub async fn handle_unknown_command(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
    msg_content: &str,
) {
    let Some(guild_id) = message.guild_id else {
        return;
    };
    if message.author.bot {
        return;
    }

    let Some((name, args)) = split_command(msg_content) else {
        debug!("ignoring bare prefix");
        return;
    };

    let invocation = invocation_for(
        name,
        args,
        guild_id,
        message.channel_id,
        message.author.id,
    );
    let result = data.moderator.on_command(&invocation).await;

    if let Err(source) = message.channel_id.say(&ctx.http, render(&result)).await {
        error!(?source, "failed to answer unknown command");
    }
}

fn split_command(content: &str) -> Option<(&str, Option<&str>)> {
    let content = content.trim();
    let (name, rest) = match content.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim())),
        None => (content, None),
    };

    name.chars()
        .next()
        .filter(char::is_ascii_alphanumeric)
        .map(|_| (name, rest.filter(|rest| !rest.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::split_command;

    #[test]
    fn splits_name_from_arguments() {
        assert_eq!(split_command("frob  a b "), Some(("frob", Some("a b"))));
        assert_eq!(split_command("frob"), Some(("frob", None)));
    }

    #[test]
    fn ignores_punctuation_after_prefix() {
        assert_eq!(split_command("!!"), None);
        assert_eq!(split_command("  "), None);
    }
}
