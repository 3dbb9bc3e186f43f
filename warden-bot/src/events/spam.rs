use poise::serenity_prelude as serenity;
use tracing::debug;

use warden_core::{ChannelId, Data, GuildId, MessageEvent, UserId};
use warden_utils::time::snowflake_timestamp;

/// Feed a guild message into the per-guild rate window.
pub async fn handle_message_spam(data: &Data, message: &serenity::Message) {
    if message.webhook_id.is_some() {
        return;
    }

    let Some(guild_id) = message.guild_id else {
        return;
    };

    let event = MessageEvent {
        guild: GuildId::new(guild_id.get()),
        channel: ChannelId::new(message.channel_id.get()),
        author: UserId::new(message.author.id.get()),
        timestamp: snowflake_timestamp(message.id.get()),
        content: message.content.clone(),
        is_bot: message.author.bot,
    };

    if data.moderator.on_message(&event).await {
        debug!(
            guild_id = %guild_id,
            user_id = %message.author.id,
            "spam burst sanctioned"
        );
    }
}
