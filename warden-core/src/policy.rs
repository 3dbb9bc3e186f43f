use std::time::Duration;

use warden_utils::parse::MAX_SANCTION_SECONDS;

/// Thresholds and lengths that drive automatic moderation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModerationPolicy {
    /// Warnings before the escalation timeout; 0 disables it.
    pub warn_timeout_threshold: u32,
    /// Warnings before the escalation ban; 0 disables it.
    pub warn_ban_threshold: u32,
    pub warn_timeout: Duration,
    pub spam_window: Duration,
    pub spam_message_threshold: usize,
    pub spam_timeout: Duration,
    pub max_sanction_seconds: u64,
    pub mute_role_name: String,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            warn_timeout_threshold: 3,
            warn_ban_threshold: 5,
            warn_timeout: Duration::from_secs(24 * 60 * 60),
            spam_window: Duration::from_secs(5),
            spam_message_threshold: 5,
            spam_timeout: Duration::from_secs(10 * 60),
            max_sanction_seconds: MAX_SANCTION_SECONDS,
            mute_role_name: "Muted".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Escalation {
    Timeout(Duration),
    Ban,
}

impl ModerationPolicy {
    /// Escalation owed by the warn that brought the count to `count`.
    ///
    /// Only the warn that lands exactly on a threshold escalates, so each
    /// escalation fires once per crossing. Ban wins if both thresholds match.
    pub fn escalation_for(&self, count: u32) -> Option<Escalation> {
        if self.warn_ban_threshold > 0 && count == self.warn_ban_threshold {
            return Some(Escalation::Ban);
        }
        if self.warn_timeout_threshold > 0 && count == self.warn_timeout_threshold {
            return Some(Escalation::Timeout(self.warn_timeout));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Escalation, ModerationPolicy};

    #[test]
    fn escalates_once_per_threshold() {
        let policy = ModerationPolicy::default();
        let fired: Vec<_> = (1..=8)
            .filter_map(|count| policy.escalation_for(count).map(|e| (count, e)))
            .collect();

        assert_eq!(
            fired,
            vec![
                (3, Escalation::Timeout(Duration::from_secs(86_400))),
                (5, Escalation::Ban)
            ]
        );
    }

    #[test]
    fn ban_wins_when_thresholds_coincide() {
        let policy = ModerationPolicy {
            warn_timeout_threshold: 2,
            warn_ban_threshold: 2,
            ..ModerationPolicy::default()
        };
        assert_eq!(policy.escalation_for(2), Some(Escalation::Ban));
    }

    #[test]
    fn zero_threshold_disables() {
        let policy = ModerationPolicy {
            warn_timeout_threshold: 0,
            warn_ban_threshold: 0,
            ..ModerationPolicy::default()
        };
        assert!((0..10).all(|count| policy.escalation_for(count).is_none()));
    }
}
