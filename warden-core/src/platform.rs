//! Contract between the engine and a concrete chat platform.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DeliveryError, PlatformError};
use crate::guard::Capabilities;
use crate::id::{ChannelId, GuildId, RoleId, UserId};

/// A guild member as the engine sees it.
#[derive(Clone, Debug)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
    pub nickname: Option<String>,
    /// Position of the highest held role; higher means more authority.
    pub rank: i64,
    pub capabilities: Capabilities,
    pub is_bot: bool,
    /// Held role names, highest first, without the implicit everyone role.
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct GuildSummary {
    pub id: GuildId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub member_count: Option<u64>,
    pub channel_count: usize,
    pub role_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Channel(ChannelId),
    Direct(UserId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleHandle {
    pub id: RoleId,
    pub name: String,
}

/// Normalized actions the engine can ask of a platform.
///
/// Calls are never retried by the engine; a failure is reported once.
#[async_trait]
pub trait Platform: Send + Sync {
    /// `Ok(None)` when the user is not a member of the guild.
    async fn member(&self, guild: GuildId, user: UserId) -> Result<Option<Member>, PlatformError>;

    async fn guild_summary(&self, guild: GuildId) -> Result<GuildSummary, PlatformError>;

    async fn send_message(
        &self,
        destination: Destination,
        content: &str,
    ) -> Result<(), DeliveryError>;

    async fn get_or_create_role(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<RoleHandle, PlatformError>;

    async fn has_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: &RoleHandle,
    ) -> Result<bool, PlatformError>;

    async fn apply_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: &RoleHandle,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: &RoleHandle,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn timeout_subject(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn kick(&self, guild: GuildId, user: UserId, reason: &str) -> Result<(), PlatformError>;

    async fn ban(&self, guild: GuildId, user: UserId, reason: &str) -> Result<(), PlatformError>;
}
