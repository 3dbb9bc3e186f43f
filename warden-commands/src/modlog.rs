use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use tokio::sync::OnceCell;
use tracing::info;

use warden_core::GuildId;
use warden_core::audit::{AuditRecord, AuditSink};
use warden_utils::embed::DEFAULT_EMBED_COLOR;
use warden_utils::formatting::{action_display_name, escape_mentions, format_compact_duration};

use crate::adapter::guild_id;

pub const DEFAULT_MODLOG_CHANNEL: &str = "mod-logs";

/// Audit sink that posts every action to a private log channel in the guild.
pub struct ModlogChannelAuditSink {
    http: Arc<serenity::Http>,
    channel_name: String,
    channels: DashMap<GuildId, Arc<OnceCell<serenity::ChannelId>>>,
}

impl std::fmt::Debug for ModlogChannelAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModlogChannelAuditSink")
            .field("channel_name", &self.channel_name)
            .field("cached_channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

impl ModlogChannelAuditSink {
    pub fn new(http: Arc<serenity::Http>, channel_name: impl Into<String>) -> Self {
        Self {
            http,
            channel_name: channel_name.into(),
            channels: DashMap::new(),
        }
    }

    async fn resolve_channel(&self, guild: GuildId) -> anyhow::Result<serenity::ChannelId> {
        cached_channel(&self.channels, guild, || self.find_or_create_channel(guild)).await
    }

    async fn find_or_create_channel(&self, guild: GuildId) -> anyhow::Result<serenity::ChannelId> {
        let discord_guild = guild_id(guild);
        let existing = discord_guild
            .channels(&self.http)
            .await
            .context("failed to list guild channels")?
            .into_values()
            .find(|channel| {
                channel.kind == serenity::ChannelType::Text && channel.name == self.channel_name
            });

        if let Some(channel) = existing {
            return Ok(channel.id);
        }

        // @everyone shares its id with the guild.
        let hidden = serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: serenity::Permissions::VIEW_CHANNEL,
            kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild.get())),
        };
        let created = discord_guild
            .create_channel(
                &self.http,
                serenity::CreateChannel::new(&self.channel_name)
                    .kind(serenity::ChannelType::Text)
                    .permissions(vec![hidden]),
            )
            .await
            .context("failed to create modlog channel")?;
        info!(guild_id = %guild, channel_id = %created.id, "created modlog channel");
        Ok(created.id)
    }
}

/// Resolve a guild's channel once; concurrent callers wait on the same lookup.
/// A failed lookup leaves the cell empty so the next record tries again.
async fn cached_channel<F, Fut>(
    channels: &DashMap<GuildId, Arc<OnceCell<serenity::ChannelId>>>,
    guild: GuildId,
    resolve: F,
) -> anyhow::Result<serenity::ChannelId>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<serenity::ChannelId>>,
{
    let cell = Arc::clone(channels.entry(guild).or_default().value());
    cell.get_or_try_init(resolve).await.copied()
}

pub(crate) fn modlog_description(record: &AuditRecord) -> String {
    let mut fields = vec![
        format!("**Action :** {}", action_display_name(record.action.as_str())),
        format!("**Target :** {}", record.target_id.mention()),
        format!("**Reason :** {}", escape_mentions(&record.reason)),
    ];

    if let Some(seconds) = record.duration_seconds {
        fields.push(format!("**Duration :** {}", format_compact_duration(seconds)));
    }

    let when = record.timestamp.timestamp();
    fields.push(format!("**Moderator :** {}", record.actor_id.mention()));
    fields.push(format!("**When :** <t:{when}:R> • <t:{when}:f>"));
    fields.join("\n")
}

#[async_trait]
impl AuditSink for ModlogChannelAuditSink {
    async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let channel = self.resolve_channel(record.guild_id).await?;

        let embed = serenity::CreateEmbed::new()
            .color(DEFAULT_EMBED_COLOR)
            .title(action_display_name(record.action.as_str()))
            .description(modlog_description(record));

        if let Err(source) = channel
            .send_message(&self.http, serenity::CreateMessage::new().embed(embed))
            .await
        {
            // The channel may have been deleted since it was cached.
            self.channels
                .remove_if(&record.guild_id, |_, cell| cell.get() == Some(&channel));
            return Err(source).context("failed to post modlog entry");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use dashmap::DashMap;
    use poise::serenity_prelude as serenity;

    use warden_core::audit::{AuditAction, AuditRecord};
    use warden_core::{GuildId, UserId};

    use super::{cached_channel, modlog_description};

    #[tokio::test]
    async fn concurrent_records_resolve_the_channel_once() {
        let channels = DashMap::new();
        let lookups = AtomicUsize::new(0);
        let counter = &lookups;
        let resolve = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(serenity::ChannelId::new(77))
        };

        let (first, second) = tokio::join!(
            cached_channel(&channels, GuildId::new(1), resolve),
            cached_channel(&channels, GuildId::new(1), resolve),
        );

        assert_eq!(first.unwrap(), serenity::ChannelId::new(77));
        assert_eq!(second.unwrap(), serenity::ChannelId::new(77));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookup_is_retried_by_the_next_record() {
        let channels = DashMap::new();
        let failed = cached_channel(&channels, GuildId::new(1), || async {
            Err(anyhow::anyhow!("missing permissions"))
        })
        .await;
        assert!(failed.is_err());

        let resolved = cached_channel(&channels, GuildId::new(1), || async {
            Ok(serenity::ChannelId::new(5))
        })
        .await;
        assert_eq!(resolved.unwrap(), serenity::ChannelId::new(5));
    }

    #[test]
    fn describes_timed_actions() {
        let record = AuditRecord::new(
            AuditAction::Mute,
            GuildId::new(1),
            UserId::new(2),
            UserId::new(3),
            "ping @everyone",
        )
        .with_duration(3600);

        let description = modlog_description(&record);
        assert!(description.starts_with("**Action :** Mute\n**Target :** <@3>"));
        assert!(description.contains("**Reason :** ping @\u{200B}everyone"));
        assert!(description.contains("**Duration :** 1h"));
        assert!(description.contains("**Moderator :** <@2>"));
    }

    #[test]
    fn omits_duration_for_instant_actions() {
        let record = AuditRecord::new(
            AuditAction::Kick,
            GuildId::new(1),
            UserId::new(2),
            UserId::new(3),
            "bye",
        );
        assert!(!modlog_description(&record).contains("Duration"));
    }
}
