use warden_utils::COMMAND_PREFIX;

use super::{ActionReport, CommandResult, Invocation, Moderator};
use crate::error::ModerationError;
use crate::registry::{self, COMMANDS};

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Moderator {
    pub(crate) async fn user_info(&self, invocation: Invocation<'_>) -> CommandResult {
        let Invocation {
            request, actor, args, ..
        } = invocation;
        let member = match args.target {
            Some(user) if user != actor.id => self.require_member(request.guild, user).await?,
            _ => actor,
        };

        let warnings = self
            .registry
            .get(request.guild)
            .map_or(0, |context| context.ledger.count(member.id));
        let roles = if member.roles.is_empty() {
            "None".to_owned()
        } else {
            member.roles.join(", ")
        };
        let joined = member
            .joined_at
            .map_or_else(|| "Unknown".to_owned(), |at| at.format(DATE_FORMAT).to_string());

        let lines = [
            format!("User Information: {}", member.display_name),
            format!("**User ID :** {}", member.id),
            format!(
                "**Nickname :** {}",
                member.nickname.as_deref().unwrap_or("None")
            ),
            format!("**Account Created :** {}", member.created_at.format(DATE_FORMAT)),
            format!("**Joined Server :** {joined}"),
            format!("**Roles :** {roles}"),
            format!("**Warnings :** {warnings}"),
        ];
        Ok(ActionReport::new(lines.join("\n")))
    }

    pub(crate) async fn server_info(&self, invocation: Invocation<'_>) -> CommandResult {
        let summary = self
            .platform
            .guild_summary(invocation.request.guild)
            .await
            .map_err(|source| {
                ModerationError::Unexpected(
                    anyhow::Error::new(source).context("guild lookup failed"),
                )
            })?;

        let member_count = summary
            .member_count
            .map_or_else(|| "Unknown".to_owned(), |count| count.to_string());
        let lines = [
            format!("{} Server Information", summary.name),
            format!("**Server ID :** {}", summary.id),
            format!("**Owner :** {}", summary.owner_id.mention()),
            format!("**Created On :** {}", summary.created_at.format(DATE_FORMAT)),
            format!("**Member Count :** {member_count}"),
            format!("**Channel Count :** {}", summary.channel_count),
            format!("**Role Count :** {}", summary.role_count),
        ];
        Ok(ActionReport::new(lines.join("\n")))
    }

    pub(crate) async fn help(&self, invocation: Invocation<'_>) -> CommandResult {
        let Some(name) = invocation.args.word.as_deref() else {
            return Ok(ActionReport::new(overview()));
        };

        let Some(spec) = registry::lookup(name) else {
            return Err(ModerationError::NotFound(format!(
                "No command named `{name}`. Use `{COMMAND_PREFIX}help` to list commands."
            )));
        };

        let mut lines = vec![
            format!("Command Help: {}", spec.meta.name),
            spec.meta.desc.to_owned(),
            format!("**Usage :** `{}`", spec.meta.usage),
        ];
        if let Some(capability) = spec.capability {
            lines.push(format!("**Requires :** {capability}"));
        }
        Ok(ActionReport::new(lines.join("\n")))
    }
}

fn overview() -> String {
    let mut categories: Vec<(&str, Vec<String>)> = Vec::new();
    for spec in COMMANDS {
        let label = format!("`{COMMAND_PREFIX}{}`", spec.meta.name);
        match categories
            .iter_mut()
            .find(|(category, _)| *category == spec.meta.category)
        {
            Some((_, names)) => names.push(label),
            None => categories.push((spec.meta.category, vec![label])),
        }
    }

    let mut lines = vec![
        "Moderator Bot Help".to_owned(),
        format!("Use `{COMMAND_PREFIX}help <command>` for detailed information about a command."),
    ];
    lines.extend(
        categories
            .into_iter()
            .map(|(category, names)| format!("**{category} :** {}", names.join(" "))),
    );
    lines.join("\n")
}
