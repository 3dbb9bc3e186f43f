use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::id::GuildId;
use crate::ledger::InfractionLedger;
use crate::rate_window::RateWindowTracker;
use crate::scheduler::ActiveSanctions;

/// All moderation state for one guild. Nothing here is shared across guilds.
#[derive(Debug)]
pub struct GuildContext {
    pub guild_id: GuildId,
    pub ledger: InfractionLedger,
    pub rate_window: RateWindowTracker,
    pub sanctions: ActiveSanctions,
}

/// Lazily creates guild contexts and keeps them for the process lifetime.
#[derive(Clone, Debug)]
pub struct GuildRegistry {
    guilds: Arc<DashMap<GuildId, Arc<GuildContext>>>,
    spam_window: Duration,
    spam_threshold: usize,
}

impl GuildRegistry {
    pub fn new(spam_window: Duration, spam_threshold: usize) -> Self {
        Self {
            guilds: Arc::new(DashMap::new()),
            spam_window,
            spam_threshold,
        }
    }

    pub fn context(&self, guild_id: GuildId) -> Arc<GuildContext> {
        if let Some(existing) = self.guilds.get(&guild_id) {
            return Arc::clone(existing.value());
        }

        let entry = self.guilds.entry(guild_id).or_insert_with(|| {
            Arc::new(GuildContext {
                guild_id,
                ledger: InfractionLedger::new(),
                rate_window: RateWindowTracker::new(self.spam_window, self.spam_threshold),
                sanctions: ActiveSanctions::default(),
            })
        });
        Arc::clone(entry.value())
    }

    /// Existing context only; never creates one.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildContext>> {
        self.guilds
            .get(&guild_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Prune stale rate windows in every guild. Returns the number of users dropped.
    pub fn sweep_rate_windows(&self, now: DateTime<Utc>) -> usize {
        let contexts: Vec<_> = self
            .guilds
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        contexts
            .iter()
            .map(|context| context.rate_window.sweep(now))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::GuildRegistry;
    use crate::id::{GuildId, UserId};

    #[test]
    fn contexts_are_created_once_and_isolated() {
        let registry = GuildRegistry::new(Duration::from_secs(5), 5);
        assert!(registry.get(GuildId::new(1)).is_none());

        let first = registry.context(GuildId::new(1));
        let again = registry.context(GuildId::new(1));
        let other = registry.context(GuildId::new(2));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.len(), 2);

        first.ledger.warn(UserId::new(9));
        assert_eq!(again.ledger.count(UserId::new(9)), 1);
        assert_eq!(other.ledger.count(UserId::new(9)), 0);
    }

    #[test]
    fn sweep_visits_every_guild() {
        let registry = GuildRegistry::new(Duration::from_secs(5), 5);
        let long_ago = Utc::now() - chrono::TimeDelta::minutes(5);
        for guild in 1..=3 {
            registry
                .context(GuildId::new(guild))
                .rate_window
                .record_and_check(UserId::new(1), long_ago);
        }

        assert_eq!(registry.sweep_rate_windows(Utc::now()), 3);
    }
}
