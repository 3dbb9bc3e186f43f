//! Moderation action dispatcher: validate, authorize, execute, notify, audit.

mod actions;
mod info;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use warden_utils::formatting::format_compact_duration;

use crate::audit::{AuditAction, AuditRecord, AuditSink, emit};
use crate::error::{ErrorClass, ModerationError};
use crate::guard::{Authorization, authorize};
use crate::guild::GuildRegistry;
use crate::id::{ChannelId, GuildId, UserId};
use crate::platform::{Destination, Member, Platform};
use crate::policy::ModerationPolicy;
use crate::registry::{self, CommandSpec, MEMBER_NOT_FOUND, ParsedArgs};
use crate::scheduler::{SanctionKind, SanctionScheduler, SanctionStore};

pub const DM_FAILED_NOTE: &str = "Note: Could not DM user about this action.";

/// A command as delivered by the platform adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub args: Vec<String>,
    pub actor: UserId,
    pub guild: GuildId,
    pub channel: ChannelId,
}

/// A message posted in a guild channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub author: UserId,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub is_bot: bool,
}

/// What a successful command reports back to the moderator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub content: String,
    /// Set when a warn escalated into a timeout or ban.
    pub escalation_message: Option<String>,
    /// Non-fatal problems, such as an undeliverable DM.
    pub notes: Vec<String>,
}

impl ActionReport {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![self.content.clone()];
        lines.extend(self.escalation_message.clone());
        lines.extend(self.notes.iter().cloned());
        lines.join("\n")
    }
}

pub type CommandResult = Result<ActionReport, ModerationError>;

/// Reply text for a finished command.
pub fn render(result: &CommandResult) -> String {
    match result {
        Ok(report) => report.render(),
        Err(source) => format!("❌ {}", source.user_message()),
    }
}

/// A validated command ready for its handler.
pub struct Invocation<'a> {
    pub request: &'a CommandInvocation,
    pub spec: &'static CommandSpec,
    pub actor: Member,
    pub args: ParsedArgs,
}

fn required_target(args: &ParsedArgs) -> Result<UserId, ModerationError> {
    args.target
        .ok_or_else(|| ModerationError::NotFound(MEMBER_NOT_FOUND.to_owned()))
}

/// Entry point for every event the platform adapter delivers.
pub struct Moderator {
    policy: ModerationPolicy,
    platform: Arc<dyn Platform>,
    audit: Arc<dyn AuditSink>,
    registry: GuildRegistry,
    scheduler: SanctionScheduler,
    bot_user: UserId,
}

impl std::fmt::Debug for Moderator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Moderator")
            .field("policy", &self.policy)
            .field("guilds", &self.registry.len())
            .field("bot_user", &self.bot_user)
            .finish_non_exhaustive()
    }
}

impl Moderator {
    pub fn new(
        policy: ModerationPolicy,
        platform: Arc<dyn Platform>,
        audit: Arc<dyn AuditSink>,
        store: Arc<dyn SanctionStore>,
        bot_user: UserId,
    ) -> Self {
        let registry = GuildRegistry::new(policy.spam_window, policy.spam_message_threshold);
        let scheduler = SanctionScheduler::new(
            registry.clone(),
            Arc::clone(&platform),
            Arc::clone(&audit),
            store,
            policy.mute_role_name.clone(),
            bot_user,
        );

        Self {
            policy,
            platform,
            audit,
            registry,
            scheduler,
            bot_user,
        }
    }

    pub fn policy(&self) -> &ModerationPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &GuildRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &SanctionScheduler {
        &self.scheduler
    }

    /// Re-arm sanctions persisted by a previous run.
    pub async fn restore_sanctions(&self) -> anyhow::Result<usize> {
        self.scheduler.restore().await
    }

    /// Feed a message into spam detection. Returns true when it triggered a sanction.
    pub async fn on_message(&self, event: &MessageEvent) -> bool {
        if event.is_bot {
            debug!(user_id = %event.author, "ignoring bot message");
            return false;
        }

        let context = self.registry.context(event.guild);
        let check = context
            .rate_window
            .record_and_check(event.author, event.timestamp);
        if !check.triggered {
            return false;
        }

        let sanctioned = self.sanction_spammer(event).await;
        if !sanctioned {
            context.rate_window.clear_sanctioned(event.author);
        }
        sanctioned
    }

    async fn sanction_spammer(&self, event: &MessageEvent) -> bool {
        let reason = "Spam detection";
        let timeout = self.policy.spam_timeout;

        if let Err(source) = self
            .platform
            .timeout_subject(event.guild, event.author, timeout, reason)
            .await
        {
            error!(
                guild_id = %event.guild,
                user_id = %event.author,
                ?source,
                "failed to time out spammer"
            );
            return false;
        }

        self.scheduler
            .schedule_timed_removal(
                event.guild,
                event.author,
                SanctionKind::Timeout,
                timeout,
                Some(event.channel),
            )
            .await;

        let notice = format!(
            "Auto-Moderation\n⛔ {} has been timed out for spamming ({}).",
            event.author.mention(),
            format_compact_duration(timeout.as_secs())
        );
        if let Err(source) = self
            .platform
            .send_message(Destination::Channel(event.channel), &notice)
            .await
        {
            warn!(channel_id = %event.channel, ?source, "failed to post spam notice");
        }

        info!(guild_id = %event.guild, user_id = %event.author, "spam timeout applied");
        emit(
            self.audit.as_ref(),
            AuditRecord::new(
                AuditAction::AutoTimeout,
                event.guild,
                self.bot_user,
                event.author,
                reason,
            )
            .with_duration(timeout.as_secs()),
        )
        .await;
        true
    }

    /// Run one command and log its failure according to its class.
    pub async fn on_command(&self, request: &CommandInvocation) -> CommandResult {
        let result = self.execute(request).await;

        if let Err(source) = &result {
            match source.class() {
                ErrorClass::User => debug!(
                    command = %request.name,
                    actor_id = %request.actor,
                    reason = %source,
                    "command rejected"
                ),
                ErrorClass::Operational => error!(
                    command = %request.name,
                    guild_id = %request.guild,
                    actor_id = %request.actor,
                    ?source,
                    "moderation action failed"
                ),
                ErrorClass::Unexpected => error!(
                    command = %request.name,
                    guild_id = %request.guild,
                    actor_id = %request.actor,
                    args = ?request.args,
                    error = %format!("{source:#}"),
                    "unexpected error while running command"
                ),
            }
        }

        result
    }

    async fn execute(&self, request: &CommandInvocation) -> CommandResult {
        let Some(spec) = registry::lookup(&request.name) else {
            return Ok(ActionReport::new(format!(
                "Unknown command `{}`. Use `!help` to see available commands.",
                request.name
            )));
        };

        let args = registry::parse_args(spec, &request.args, self.policy.max_sanction_seconds)?;

        let actor = self
            .lookup_member(request.guild, request.actor)
            .await?
            .ok_or_else(|| ModerationError::NotFound(MEMBER_NOT_FOUND.to_owned()))?;
        if let Some(capability) = spec.capability {
            if !actor.capabilities.contains(capability) {
                return Err(ModerationError::MissingCapability(capability));
            }
        }

        (spec.handler)(
            self,
            Invocation {
                request,
                spec,
                actor,
                args,
            },
        )
        .await
    }

    async fn lookup_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<Member>, ModerationError> {
        self.platform.member(guild, user).await.map_err(|source| {
            ModerationError::Unexpected(anyhow::Error::new(source).context("member lookup failed"))
        })
    }

    async fn require_member(&self, guild: GuildId, user: UserId) -> Result<Member, ModerationError> {
        self.lookup_member(guild, user)
            .await?
            .ok_or_else(|| ModerationError::NotFound(MEMBER_NOT_FOUND.to_owned()))
    }

    fn check_rank(
        &self,
        action: &'static str,
        actor: &Member,
        target: &Member,
    ) -> Result<(), ModerationError> {
        match authorize(actor.rank, target.rank) {
            Authorization::Allowed => Ok(()),
            Authorization::Denied => Err(ModerationError::RankConflict {
                action,
                actor_rank: actor.rank,
                target_rank: target.rank,
            }),
        }
    }

    /// DM the target. A failure becomes a note on the report, never an error.
    async fn notify(&self, user: UserId, content: &str, report: &mut ActionReport) {
        if let Err(source) = self
            .platform
            .send_message(Destination::Direct(user), content)
            .await
        {
            warn!(user_id = %user, ?source, "could not DM moderation notice");
            report.notes.push(DM_FAILED_NOTE.to_owned());
        }
    }

    async fn guild_label(&self, guild: GuildId) -> String {
        match self.platform.guild_summary(guild).await {
            Ok(summary) => summary.name,
            Err(source) => {
                debug!(guild_id = %guild, ?source, "guild name unavailable");
                format!("Server {guild}")
            }
        }
    }

    async fn record_audit(&self, record: AuditRecord) {
        emit(self.audit.as_ref(), record).await;
    }
}
