use warden_utils::formatting::format_compact_duration;

use super::{ActionReport, CommandResult, Invocation, Moderator, required_target};
use crate::audit::{AuditAction, AuditRecord};
use crate::error::ModerationError;
use crate::id::{ChannelId, GuildId, UserId};
use crate::policy::Escalation;
use crate::scheduler::{Release, SanctionKind};

impl Moderator {
    fn warning_tally(&self, count: u32) -> String {
        match self.policy.warn_ban_threshold {
            0 => count.to_string(),
            limit => format!("{count}/{limit}"),
        }
    }

    pub(crate) async fn warn(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request,
            actor,
            args,
            ..
        } = invocation;
        let target = self
            .require_member(request.guild, required_target(&args)?)
            .await?;
        self.check_rank("warn", &actor, &target)?;

        let reason = args.reason();
        let count = self.registry.context(request.guild).ledger.warn(target.id);
        let tally = self.warning_tally(count);
        let mut report = ActionReport::new(format!(
            "✅ {} has been warned. Warning count: {tally}",
            target.id.mention()
        ));

        if let Some(escalation) = self.policy.escalation_for(count) {
            match self
                .escalate(request.guild, request.channel, target.id, escalation, reason)
                .await
            {
                Ok(message) => report.escalation_message = Some(message),
                Err(source) => {
                    tracing::error!(
                        guild_id = %request.guild,
                        user_id = %target.id,
                        count,
                        ?source,
                        "warning escalation failed"
                    );
                    report
                        .notes
                        .push(format!("Escalation failed: {}", source.user_message()));
                }
            }
        }

        let guild_name = self.guild_label(request.guild).await;
        let mut notice = format!(
            "Warning Notice\nYou have been warned in {guild_name}\n**Reason :** {reason}\n**Warning Count :** {tally}"
        );
        if let Some(action) = &report.escalation_message {
            notice.push_str(&format!("\n**Action Taken :** {action}"));
        }
        self.notify(target.id, &notice, &mut report).await;

        self.record_audit(AuditRecord::new(
            AuditAction::Warn,
            request.guild,
            actor.id,
            target.id,
            reason,
        ))
        .await;

        Ok(report)
    }

    /// Apply an automatic sanction owed by a warning count. Runs the same
    /// execute and audit steps as the manual commands, with the bot as actor.
    async fn escalate(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: UserId,
        escalation: Escalation,
        reason: &str,
    ) -> Result<String, ModerationError> {
        match escalation {
            Escalation::Timeout(duration) => {
                self.platform
                    .timeout_subject(guild, target, duration, &format!("Multiple warnings: {reason}"))
                    .await
                    .map_err(|source| ModerationError::platform("time out", source))?;
                self.scheduler
                    .schedule_timed_removal(guild, target, SanctionKind::Timeout, duration, Some(channel))
                    .await;
                self.record_audit(
                    AuditRecord::new(AuditAction::AutoTimeout, guild, self.bot_user, target, reason)
                        .with_duration(duration.as_secs()),
                )
                .await;
                Ok(format!(
                    "User has been timed out for {}.",
                    format_compact_duration(duration.as_secs())
                ))
            }
            Escalation::Ban => {
                self.platform
                    .ban(guild, target, &format!("Exceeded warning limit: {reason}"))
                    .await
                    .map_err(|source| ModerationError::platform("ban", source))?;
                self.record_audit(AuditRecord::new(
                    AuditAction::AutoBan,
                    guild,
                    self.bot_user,
                    target,
                    reason,
                ))
                .await;
                Ok("User has been banned for exceeding warning limit.".to_owned())
            }
        }
    }

    pub(crate) async fn mute(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request,
            spec,
            actor,
            args,
        } = invocation;
        let duration = args.duration.ok_or(ModerationError::Usage {
            usage: spec.meta.usage,
        })?;
        let target = self
            .require_member(request.guild, required_target(&args)?)
            .await?;
        self.check_rank("mute", &actor, &target)?;

        let reason = args.reason();
        self.scheduler
            .apply_mute(request.guild, target.id, duration, Some(request.channel), reason)
            .await?;

        let label = format_compact_duration(duration.as_secs());
        let mut report = ActionReport::new(format!(
            "✅ {} has been muted for {label}",
            target.id.mention()
        ));

        let guild_name = self.guild_label(request.guild).await;
        let notice = format!(
            "Mute Notice\nYou have been muted in {guild_name} for {label}\n**Reason :** {reason}"
        );
        self.notify(target.id, &notice, &mut report).await;

        self.record_audit(
            AuditRecord::new(AuditAction::Mute, request.guild, actor.id, target.id, reason)
                .with_duration(duration.as_secs()),
        )
        .await;

        Ok(report)
    }

    pub(crate) async fn unmute(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request,
            actor,
            args,
            ..
        } = invocation;
        let target = self
            .require_member(request.guild, required_target(&args)?)
            .await?;

        let released = self
            .scheduler
            .lift_mute(request.guild, target.id, "Unmute command issued")
            .await?;
        if released == Release::AlreadyAbsent {
            return Err(ModerationError::NotFound(format!(
                "{} is not muted!",
                target.id.mention()
            )));
        }

        let mut report = ActionReport::new(format!("✅ {} has been unmuted.", target.id.mention()));
        let guild_name = self.guild_label(request.guild).await;
        self.notify(
            target.id,
            &format!("Unmute Notice\nYou have been unmuted in {guild_name}"),
            &mut report,
        )
        .await;

        self.record_audit(AuditRecord::new(
            AuditAction::Unmute,
            request.guild,
            actor.id,
            target.id,
            "Manual unmute",
        ))
        .await;

        Ok(report)
    }

    pub(crate) async fn kick(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request,
            actor,
            args,
            ..
        } = invocation;
        let target = self
            .require_member(request.guild, required_target(&args)?)
            .await?;
        self.check_rank("kick", &actor, &target)?;

        let reason = args.reason();
        // Fetch the label first; the target may no longer share the guild afterwards.
        let guild_name = self.guild_label(request.guild).await;
        self.platform
            .kick(request.guild, target.id, reason)
            .await
            .map_err(|source| ModerationError::platform("kick", source))?;

        let mut report = ActionReport::new(format!(
            "✅ {} has been kicked. Reason: {reason}",
            target.id.mention()
        ));
        self.notify(
            target.id,
            &format!("Kick Notice\nYou have been kicked from {guild_name}\n**Reason :** {reason}"),
            &mut report,
        )
        .await;

        self.record_audit(AuditRecord::new(
            AuditAction::Kick,
            request.guild,
            actor.id,
            target.id,
            reason,
        ))
        .await;

        Ok(report)
    }

    pub(crate) async fn ban(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request,
            actor,
            args,
            ..
        } = invocation;
        let target = self
            .require_member(request.guild, required_target(&args)?)
            .await?;
        self.check_rank("ban", &actor, &target)?;

        let reason = args.reason();
        let guild_name = self.guild_label(request.guild).await;
        self.platform
            .ban(request.guild, target.id, reason)
            .await
            .map_err(|source| ModerationError::platform("ban", source))?;

        let mut report = ActionReport::new(format!(
            "✅ {} has been banned. Reason: {reason}",
            target.id.mention()
        ));
        self.notify(
            target.id,
            &format!("Ban Notice\nYou have been banned from {guild_name}\n**Reason :** {reason}"),
            &mut report,
        )
        .await;

        self.record_audit(AuditRecord::new(
            AuditAction::Ban,
            request.guild,
            actor.id,
            target.id,
            reason,
        ))
        .await;

        Ok(report)
    }

    pub(crate) async fn clear_warnings(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request,
            actor,
            args,
            ..
        } = invocation;
        let target = self
            .require_member(request.guild, required_target(&args)?)
            .await?;
        self.check_rank("clear warnings for", &actor, &target)?;

        let removed = self.registry.context(request.guild).ledger.reset(target.id);
        self.record_audit(AuditRecord::new(
            AuditAction::ClearWarnings,
            request.guild,
            actor.id,
            target.id,
            args.reason(),
        ))
        .await;

        Ok(ActionReport::new(format!(
            "✅ Cleared {removed} warning(s) for {}.",
            target.id.mention()
        )))
    }

    pub(crate) async fn warnings(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation { request, args, .. } = invocation;
        let user = required_target(&args)?;

        let count = self
            .registry
            .get(request.guild)
            .map_or(0, |context| context.ledger.count(user));
        let mut lines = vec![format!(
            "{} has {} warning(s).",
            user.mention(),
            self.warning_tally(count)
        )];
        for sanction in self.scheduler.active(request.guild, user) {
            lines.push(format!(
                "Active {} until <t:{}:R>",
                sanction.kind.as_str(),
                sanction.expires_at.timestamp()
            ));
        }

        Ok(ActionReport::new(lines.join("\n")))
    }
}
