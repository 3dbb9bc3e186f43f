//! Discord implementation of the engine's platform contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use warden_core::error::{DeliveryError, PlatformError, PlatformErrorKind};
use warden_core::guard::{Capabilities, Capability};
use warden_core::platform::{Destination, GuildSummary, Member, Platform, RoleHandle};
use warden_core::{ChannelId, GuildId, RoleId, UserId};
use warden_utils::embed::notice_embed;
use warden_utils::permissions::{
    is_missing_permissions_error, is_unknown_entity_error, resolve_member_standing,
};
use warden_utils::time::{from_unix_secs, now_unix_secs, snowflake_timestamp};

pub(crate) fn guild_id(id: GuildId) -> serenity::GuildId {
    serenity::GuildId::new(id.get())
}

pub(crate) fn user_id(id: UserId) -> serenity::UserId {
    serenity::UserId::new(id.get())
}

pub(crate) fn channel_id(id: ChannelId) -> serenity::ChannelId {
    serenity::ChannelId::new(id.get())
}

fn role_id(id: RoleId) -> serenity::RoleId {
    serenity::RoleId::new(id.get())
}

pub(crate) fn platform_error(source: &serenity::Error) -> PlatformError {
    let kind = if is_missing_permissions_error(source) {
        PlatformErrorKind::MissingPermissions
    } else if is_unknown_entity_error(source) {
        PlatformErrorKind::NotFound
    } else {
        PlatformErrorKind::Other
    };
    PlatformError::new(kind, source.to_string())
}

fn lookup_error(source: &anyhow::Error) -> PlatformError {
    match source.downcast_ref::<serenity::Error>() {
        Some(source) => platform_error(source),
        None => PlatformError::other(format!("{source:#}")),
    }
}

pub(crate) fn capabilities_from(permissions: serenity::Permissions) -> Capabilities {
    [
        (serenity::Permissions::KICK_MEMBERS, Capability::KickMembers),
        (serenity::Permissions::BAN_MEMBERS, Capability::BanMembers),
        (serenity::Permissions::ADMINISTRATOR, Capability::Administrator),
    ]
    .into_iter()
    .filter(|(permission, _)| permissions.contains(*permission))
    .map(|(_, capability)| capability)
    .collect()
}

/// Permissions the mute role denies in every channel.
fn muted_permissions() -> serenity::Permissions {
    serenity::Permissions::SEND_MESSAGES
        | serenity::Permissions::SEND_MESSAGES_IN_THREADS
        | serenity::Permissions::ADD_REACTIONS
        | serenity::Permissions::SPEAK
}

/// Multi-line notices go out as embeds, single lines as plain text.
fn outgoing_message(content: &str) -> serenity::CreateMessage {
    if content.trim().contains('\n') {
        serenity::CreateMessage::new().embed(notice_embed(content))
    } else {
        serenity::CreateMessage::new().content(content)
    }
}

#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
}

impl std::fmt::Debug for SerenityPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityPlatform").finish_non_exhaustive()
    }
}

impl SerenityPlatform {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    async fn create_muted_role(
        &self,
        guild: serenity::GuildId,
        name: &str,
    ) -> Result<serenity::Role, serenity::Error> {
        let role = guild
            .create_role(
                &self.http,
                serenity::EditRole::new()
                    .name(name)
                    .permissions(serenity::Permissions::empty())
                    .audit_log_reason("Role used for mutes"),
            )
            .await?;

        let overwrite = serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: muted_permissions(),
            kind: serenity::PermissionOverwriteType::Role(role.id),
        };
        for channel in guild.channels(&self.http).await?.into_values() {
            if let Err(source) = channel
                .id
                .create_permission(&self.http, overwrite.clone())
                .await
            {
                warn!(channel_id = %channel.id, ?source, "could not restrict mute role in channel");
            }
        }

        Ok(role)
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn member(&self, guild: GuildId, user: UserId) -> Result<Option<Member>, PlatformError> {
        let Some(standing) = resolve_member_standing(&self.http, guild_id(guild), user_id(user))
            .await
            .map_err(|source| lookup_error(&source))?
        else {
            return Ok(None);
        };

        let discord_user = &standing.member.user;
        Ok(Some(Member {
            id: user,
            display_name: discord_user
                .global_name
                .clone()
                .unwrap_or_else(|| discord_user.name.clone()),
            nickname: standing.member.nick.clone(),
            rank: standing.rank,
            capabilities: capabilities_from(standing.permissions),
            is_bot: discord_user.bot,
            roles: standing.role_names,
            created_at: snowflake_timestamp(user.get()),
            joined_at: standing
                .member
                .joined_at
                .map(|joined| from_unix_secs(joined.unix_timestamp())),
        }))
    }

    async fn guild_summary(&self, guild: GuildId) -> Result<GuildSummary, PlatformError> {
        let id = guild_id(guild);
        let partial = id
            .to_partial_guild_with_counts(&self.http)
            .await
            .map_err(|source| platform_error(&source))?;
        let channel_count = id
            .channels(&self.http)
            .await
            .map_err(|source| platform_error(&source))?
            .len();

        Ok(GuildSummary {
            id: guild,
            name: partial.name,
            owner_id: UserId::new(partial.owner_id.get()),
            created_at: snowflake_timestamp(guild.get()),
            member_count: partial.approximate_member_count,
            channel_count,
            role_count: partial.roles.len(),
        })
    }

    async fn send_message(
        &self,
        destination: Destination,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let channel = match destination {
            Destination::Channel(channel) => channel_id(channel),
            Destination::Direct(user) => {
                user_id(user)
                    .create_dm_channel(&self.http)
                    .await
                    .map_err(|source| DeliveryError(source.to_string()))?
                    .id
            }
        };

        channel
            .send_message(&self.http, outgoing_message(content))
            .await
            .map_err(|source| DeliveryError(source.to_string()))?;
        Ok(())
    }

    async fn get_or_create_role(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<RoleHandle, PlatformError> {
        let id = guild_id(guild);
        let roles = id
            .roles(&self.http)
            .await
            .map_err(|source| platform_error(&source))?;

        let role = match roles.into_values().find(|role| role.name == name) {
            Some(role) => role,
            None => {
                debug!(guild_id = %guild, role = name, "creating mute role");
                self.create_muted_role(id, name)
                    .await
                    .map_err(|source| platform_error(&source))?
            }
        };

        Ok(RoleHandle {
            id: RoleId::new(role.id.get()),
            name: role.name,
        })
    }

    async fn has_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: &RoleHandle,
    ) -> Result<bool, PlatformError> {
        match guild_id(guild).member(&self.http, user_id(user)).await {
            Ok(member) => Ok(member.roles.contains(&role_id(role.id))),
            Err(source) if is_unknown_entity_error(&source) => Ok(false),
            Err(source) => Err(platform_error(&source)),
        }
    }

    async fn apply_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: &RoleHandle,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.http
            .add_member_role(guild_id(guild), user_id(user), role_id(role.id), Some(reason))
            .await
            .map_err(|source| platform_error(&source))
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: &RoleHandle,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.http
            .remove_member_role(guild_id(guild), user_id(user), role_id(role.id), Some(reason))
            .await
            .map_err(|source| platform_error(&source))
    }

    async fn timeout_subject(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let until_unix = now_unix_secs().saturating_add(duration.as_secs());
        let until = i64::try_from(until_unix)
            .ok()
            .and_then(|secs| serenity::Timestamp::from_unix_timestamp(secs).ok())
            .ok_or_else(|| PlatformError::other("timeout end is out of range"))?;

        let edit = serenity::EditMember::new()
            .disable_communication_until_datetime(until)
            .audit_log_reason(reason);
        guild_id(guild)
            .edit_member(&self.http, user_id(user), edit)
            .await
            .map(|_| ())
            .map_err(|source| platform_error(&source))
    }

    async fn kick(&self, guild: GuildId, user: UserId, reason: &str) -> Result<(), PlatformError> {
        guild_id(guild)
            .kick_with_reason(&self.http, user_id(user), reason)
            .await
            .map_err(|source| platform_error(&source))
    }

    async fn ban(&self, guild: GuildId, user: UserId, reason: &str) -> Result<(), PlatformError> {
        guild_id(guild)
            .ban_with_reason(&self.http, user_id(user), 0, reason)
            .await
            .map_err(|source| platform_error(&source))
    }
}

#[cfg(test)]
mod tests {
    use poise::serenity_prelude as serenity;

    use warden_core::guard::Capability;

    use super::capabilities_from;

    #[test]
    fn maps_discord_permissions_to_capabilities() {
        let staff = capabilities_from(
            serenity::Permissions::KICK_MEMBERS | serenity::Permissions::SEND_MESSAGES,
        );
        assert!(staff.contains(Capability::KickMembers));
        assert!(!staff.contains(Capability::BanMembers));

        let admin = capabilities_from(serenity::Permissions::ADMINISTRATOR);
        assert!(admin.contains(Capability::BanMembers));
        assert!(admin.contains(Capability::KickMembers));
    }
}
