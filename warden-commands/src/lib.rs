pub mod adapter;
pub mod dispatch;
pub mod moderation;
pub mod modlog;
pub mod utility;

use warden_core::{Data, Error};

pub use adapter::SerenityPlatform;
pub use modlog::{DEFAULT_MODLOG_CHANNEL, ModlogChannelAuditSink};

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        utility::help::help(),
        utility::userinfo::userinfo(),
        utility::serverinfo::serverinfo(),
        utility::warnings::warnings(),
        moderation::warn::warn(),
        moderation::mute::mute(),
        moderation::unmute::unmute(),
        moderation::kick::kick(),
        moderation::ban::ban(),
        moderation::clearwarns::clearwarns(),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use warden_core::registry::COMMANDS;

    use super::commands;

    #[test]
    fn every_engine_command_has_a_framework_entry() {
        let registered: HashSet<String> = commands().into_iter().map(|command| command.name).collect();
        let engine: HashSet<String> = COMMANDS
            .iter()
            .map(|spec| spec.meta.name.to_owned())
            .collect();
        assert_eq!(registered, engine);
    }
}
