use thiserror::Error;
use warden_utils::parse::DurationError;

use crate::guard::Capability;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// The platform refused the call, usually role hierarchy or a missing bot permission.
    MissingPermissions,
    NotFound,
    Other,
}

/// Failure reported by the platform adapter for a single call.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_permissions(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::MissingPermissions, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Other, message)
    }
}

/// A message could not be delivered. Never fatal to the action that caused it.
#[derive(Clone, Debug, Error)]
#[error("message delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// How an error is surfaced and whether it is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input or denied access: reply only.
    User,
    /// The platform rejected an action: reply and `error!`.
    Operational,
    /// Anything else: generic reply and `error!` with full context.
    Unexpected,
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("usage: {usage}")]
    Usage { usage: &'static str },
    #[error("missing capability {0}")]
    MissingCapability(Capability),
    #[error("cannot {action} a member ranked {target_rank} from rank {actor_rank}")]
    RankConflict {
        action: &'static str,
        actor_rank: i64,
        target_rank: i64,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid duration format `{0}`")]
    InvalidDurationFormat(String),
    #[error("duration of {seconds}s exceeds {max_seconds}s")]
    DurationTooLong { seconds: u64, max_seconds: u64 },
    #[error("platform rejected {action}")]
    PlatformAction {
        action: &'static str,
        #[source]
        source: PlatformError,
    },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<DurationError> for ModerationError {
    fn from(source: DurationError) -> Self {
        match source {
            DurationError::InvalidFormat(raw) => Self::InvalidDurationFormat(raw),
            DurationError::TooLong {
                seconds,
                max_seconds,
            } => Self::DurationTooLong {
                seconds,
                max_seconds,
            },
        }
    }
}

impl ModerationError {
    pub fn platform(action: &'static str, source: PlatformError) -> Self {
        Self::PlatformAction { action, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Usage { .. }
            | Self::MissingCapability(_)
            | Self::RankConflict { .. }
            | Self::NotFound(_)
            | Self::InvalidDurationFormat(_)
            | Self::DurationTooLong { .. } => ErrorClass::User,
            Self::PlatformAction { .. } => ErrorClass::Operational,
            Self::Unexpected(_) => ErrorClass::Unexpected,
        }
    }

    /// Reply shown to the invoking moderator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Usage { usage } => format!("Usage: `{usage}`"),
            Self::MissingCapability(capability) => format!(
                "You need the following permissions to use this command: {capability}"
            ),
            Self::RankConflict { action, .. } => {
                format!("You cannot {action} members with an equal or higher role.")
            }
            Self::NotFound(message) => message.clone(),
            Self::InvalidDurationFormat(_) => "Invalid duration format! Use: 1s, 1m, 1h, 1d".to_owned(),
            Self::DurationTooLong { max_seconds, .. } => format!(
                "Duration cannot exceed {}.",
                warden_utils::formatting::format_compact_duration(*max_seconds)
            ),
            Self::PlatformAction { action, .. } => {
                format!("I couldn't {action} that user. Check role hierarchy and permissions.")
            }
            Self::Unexpected(_) => "Something went wrong while running this command.".to_owned(),
        }
    }
}
