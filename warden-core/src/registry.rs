//! The authoritative command table: one entry, one handler per command.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use warden_utils::COMMAND_PREFIX;
use warden_utils::parse::{parse_duration_with_ceiling, parse_user_reference};

use crate::dispatcher::{CommandResult, Invocation, Moderator};
use crate::error::ModerationError;
use crate::guard::Capability;
use crate::id::UserId;

pub const DEFAULT_REASON: &str = "No reason provided";
pub const MEMBER_NOT_FOUND: &str =
    "Could not find member. Please mention a valid member or use their ID.";

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = CommandResult> + Send + 'a>>;
pub type Handler = for<'a> fn(&'a Moderator, Invocation<'a>) -> HandlerFuture<'a>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandMeta {
    pub name: &'static str,
    pub desc: &'static str,
    pub category: &'static str,
    pub usage: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// A mention or raw user id.
    Target,
    /// Compact duration such as `30m`.
    Duration,
    /// A single token.
    Word,
    /// Everything left, joined with spaces.
    Text,
}

#[derive(Clone, Copy, Debug)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: false,
    }
}

pub struct CommandSpec {
    pub meta: CommandMeta,
    pub capability: Option<Capability>,
    pub args: &'static [ArgSpec],
    pub handler: Handler,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("meta", &self.meta)
            .field("capability", &self.capability)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Arguments after validation against a command's schema.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub target: Option<UserId>,
    pub duration: Option<Duration>,
    pub word: Option<String>,
    pub text: Option<String>,
}

impl ParsedArgs {
    pub fn reason(&self) -> &str {
        self.text.as_deref().unwrap_or(DEFAULT_REASON)
    }
}

macro_rules! handler {
    ($method:ident) => {{
        fn call<'a>(moderator: &'a Moderator, invocation: Invocation<'a>) -> HandlerFuture<'a> {
            Box::pin(moderator.$method(invocation))
        }
        call as Handler
    }};
}

const TARGET_AND_REASON: &[ArgSpec] = &[
    required("user", ArgKind::Target),
    optional("reason", ArgKind::Text),
];

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        meta: CommandMeta {
            name: "warn",
            desc: "Warn a member with optional reason.",
            category: "Moderation",
            usage: "!warn <user> [reason]",
        },
        capability: Some(Capability::KickMembers),
        args: TARGET_AND_REASON,
        handler: handler!(warn),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "mute",
            desc: "Mute a member for a duration (s, m, h, d; at most 28d).",
            category: "Moderation",
            usage: "!mute <user> <duration> [reason]",
        },
        capability: Some(Capability::KickMembers),
        args: &[
            required("user", ArgKind::Target),
            required("duration", ArgKind::Duration),
            optional("reason", ArgKind::Text),
        ],
        handler: handler!(mute),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "unmute",
            desc: "Lift a member's mute.",
            category: "Moderation",
            usage: "!unmute <user>",
        },
        capability: Some(Capability::KickMembers),
        args: &[required("user", ArgKind::Target)],
        handler: handler!(unmute),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "kick",
            desc: "Kick a member with optional reason.",
            category: "Moderation",
            usage: "!kick <user> [reason]",
        },
        capability: Some(Capability::KickMembers),
        args: TARGET_AND_REASON,
        handler: handler!(kick),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "ban",
            desc: "Ban a member with optional reason.",
            category: "Moderation",
            usage: "!ban <user> [reason]",
        },
        capability: Some(Capability::BanMembers),
        args: TARGET_AND_REASON,
        handler: handler!(ban),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "clearwarns",
            desc: "Reset a member's warning count.",
            category: "Moderation",
            usage: "!clearwarns <user> [reason]",
        },
        capability: Some(Capability::KickMembers),
        args: TARGET_AND_REASON,
        handler: handler!(clear_warnings),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "warnings",
            desc: "Show a member's warning count and active sanctions.",
            category: "Information",
            usage: "!warnings <user>",
        },
        capability: Some(Capability::KickMembers),
        args: &[required("user", ArgKind::Target)],
        handler: handler!(warnings),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "userinfo",
            desc: "Show information about a member (defaults to you).",
            category: "Information",
            usage: "!userinfo [user]",
        },
        capability: None,
        args: &[optional("user", ArgKind::Target)],
        handler: handler!(user_info),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "serverinfo",
            desc: "Show information about this server.",
            category: "Information",
            usage: "!serverinfo",
        },
        capability: None,
        args: &[],
        handler: handler!(server_info),
    },
    CommandSpec {
        meta: CommandMeta {
            name: "help",
            desc: "List commands, or show details for one.",
            category: "Utility",
            usage: "!help [command]",
        },
        capability: None,
        args: &[optional("command", ArgKind::Word)],
        handler: handler!(help),
    },
];

/// Find a command by name, ignoring case and a leading prefix.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    let name = name.trim();
    let name = name.strip_prefix(COMMAND_PREFIX).unwrap_or(name);
    COMMANDS
        .iter()
        .find(|spec| spec.meta.name.eq_ignore_ascii_case(name))
}

/// Validate raw arguments against the command's schema.
///
/// Missing required arguments are usage errors; a malformed duration yields
/// its own error. Nothing here touches state or the platform.
pub fn parse_args(
    spec: &CommandSpec,
    raw: &[String],
    max_duration_seconds: u64,
) -> Result<ParsedArgs, ModerationError> {
    let usage = || ModerationError::Usage {
        usage: spec.meta.usage,
    };
    let mut tokens = raw
        .iter()
        .map(|token| token.trim())
        .filter(|token| !token.is_empty());
    let mut parsed = ParsedArgs::default();

    for arg in spec.args {
        match arg.kind {
            ArgKind::Text => {
                let rest = tokens.by_ref().collect::<Vec<_>>().join(" ");
                if rest.is_empty() && arg.required {
                    return Err(usage());
                }
                parsed.text = (!rest.is_empty()).then_some(rest);
            }
            ArgKind::Target => {
                let Some(token) = next_token(&mut tokens, arg, usage)? else {
                    continue;
                };
                let user = parse_user_reference(token)
                    .ok_or_else(|| ModerationError::NotFound(MEMBER_NOT_FOUND.to_owned()))?;
                parsed.target = Some(UserId::new(user));
            }
            ArgKind::Duration => {
                let Some(token) = next_token(&mut tokens, arg, usage)? else {
                    continue;
                };
                let seconds = parse_duration_with_ceiling(token, max_duration_seconds)?;
                parsed.duration = Some(Duration::from_secs(seconds));
            }
            ArgKind::Word => {
                parsed.word = next_token(&mut tokens, arg, usage)?.map(str::to_owned);
            }
        }
    }

    Ok(parsed)
}

fn next_token<'t>(
    tokens: &mut impl Iterator<Item = &'t str>,
    arg: &ArgSpec,
    usage: impl Fn() -> ModerationError,
) -> Result<Option<&'t str>, ModerationError> {
    match tokens.next() {
        Some(token) => Ok(Some(token)),
        None if arg.required => Err(usage()),
        None => Ok(None),
    }
}

/// Split a raw argument string the way the prefix parser does.
pub fn split_args(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| raw.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}
