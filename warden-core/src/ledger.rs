use dashmap::DashMap;

use crate::id::UserId;

/// Per-guild warning counters.
///
/// Each operation runs under the shard lock for its key, so concurrent warns
/// for the same user are all counted and each sees a distinct count.
#[derive(Debug, Default)]
pub struct InfractionLedger {
    counts: DashMap<UserId, u32>,
}

impl InfractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one warning and return the new count.
    pub fn warn(&self, user: UserId) -> u32 {
        let mut count = self.counts.entry(user).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn count(&self, user: UserId) -> u32 {
        self.counts.get(&user).map_or(0, |count| *count)
    }

    /// Clear the user's warnings and return how many were removed.
    pub fn reset(&self, user: UserId) -> u32 {
        self.counts.remove(&user).map_or(0, |(_, count)| count)
    }
}
