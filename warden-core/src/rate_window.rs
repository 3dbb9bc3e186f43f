use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::id::UserId;

#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<DateTime<Utc>>,
    /// Set once the threshold fires, cleared when the window falls back below it.
    sanctioned: bool,
}

impl RateWindow {
    fn prune(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        self.timestamps.retain(|&seen| now - seen < window);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateCheck {
    /// Entries left in the window after this event.
    pub count: usize,
    /// True only for the event that crossed the threshold.
    pub triggered: bool,
}

/// Sliding window of message timestamps per user.
///
/// Pruning is relative to the event's own timestamp, so late deliveries are
/// handled deterministically. Timestamps later than `now` are kept.
#[derive(Debug)]
pub struct RateWindowTracker {
    window: TimeDelta,
    threshold: usize,
    entries: DashMap<UserId, RateWindow>,
}

impl RateWindowTracker {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            threshold,
            entries: DashMap::new(),
        }
    }

    pub fn record_and_check(&self, user: UserId, now: DateTime<Utc>) -> RateCheck {
        let mut entry = self.entries.entry(user).or_default();
        entry.timestamps.push_back(now);
        entry.prune(now, self.window);

        let count = entry.timestamps.len();
        let over = self.threshold > 0 && count >= self.threshold;
        let triggered = over && !entry.sanctioned;
        entry.sanctioned = over;

        RateCheck { count, triggered }
    }

    /// Withdraw the trigger claimed by `record_and_check` when the sanction
    /// could not be applied, so the next message over the threshold fires again.
    pub fn clear_sanctioned(&self, user: UserId) {
        if let Some(mut entry) = self.entries.get_mut(&user) {
            entry.sanctioned = false;
        }
    }

    /// Drop users whose windows hold nothing recent. Returns how many were dropped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.prune(now, self.window);
            if self.threshold == 0 || entry.timestamps.len() < self.threshold {
                entry.sanctioned = false;
            }
            !entry.timestamps.is_empty()
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_users(&self) -> usize {
        self.entries.len()
    }
}
