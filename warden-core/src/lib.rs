//! Moderation engine: guild-scoped state, escalation, timed sanctions and
//! permission-gated dispatch, independent of any chat platform.

pub mod audit;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod guild;
pub mod id;
pub mod ledger;
pub mod platform;
pub mod policy;
pub mod rate_window;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use dispatcher::{ActionReport, CommandInvocation, CommandResult, MessageEvent, Moderator};
pub use error::ModerationError;
pub use id::{ChannelId, GuildId, RoleId, UserId};
pub use policy::ModerationPolicy;

pub type Error = anyhow::Error;

#[derive(Clone, Debug)]
pub struct Data {
    pub moderator: Arc<Moderator>,
}

pub type Context<'a> = poise::Context<'a, Data, Error>;
