//! Permission guard: role hierarchy and capability checks.
//!
//! Everything here is pure. Callers run these checks before touching any
//! state or calling the platform, so a denial never leaves partial effects.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied,
}

/// Decide whether an actor may act on a target.
///
/// A target of equal or higher rank is always protected, which also covers
/// an actor targeting themselves.
pub fn authorize(actor_rank: i64, target_rank: i64) -> Authorization {
    if target_rank >= actor_rank {
        Authorization::Denied
    } else {
        Authorization::Allowed
    }
}

/// Platform permission a command can require from its invoker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    KickMembers,
    BanMembers,
    Administrator,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Self::KickMembers => 1,
            Self::BanMembers => 1 << 1,
            Self::Administrator => 1 << 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::KickMembers => "Kick Members",
            Self::BanMembers => "Ban Members",
            Self::Administrator => "Administrator",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Set of capabilities held by a member. `Administrator` implies all others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn contains(self, capability: Capability) -> bool {
        let admin = Capability::Administrator.bit();
        self.0 & admin == admin || self.0 & capability.bit() == capability.bit()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |caps, capability| caps.with(capability))
    }
}

#[cfg(test)]
mod tests {
    use super::{Authorization, Capabilities, Capability, authorize};

    #[test]
    fn equal_or_higher_target_is_denied() {
        assert_eq!(authorize(5, 2), Authorization::Allowed);
        assert_eq!(authorize(5, 5), Authorization::Denied);
        assert_eq!(authorize(5, 9), Authorization::Denied);
        assert_eq!(authorize(0, -1), Authorization::Allowed);
        assert_eq!(authorize(i64::MAX, i64::MAX), Authorization::Denied);
    }

    #[test]
    fn denial_holds_for_every_rank_pair_at_or_above() {
        for actor in -3..=3 {
            for target in actor..=actor + 3 {
                assert_eq!(authorize(actor, target), Authorization::Denied);
            }
        }
    }

    #[test]
    fn administrator_implies_every_capability() {
        let admin: Capabilities = [Capability::Administrator].into_iter().collect();
        assert!(admin.contains(Capability::BanMembers));
        assert!(admin.contains(Capability::KickMembers));

        let kicker = Capabilities::empty().with(Capability::KickMembers);
        assert!(kicker.contains(Capability::KickMembers));
        assert!(!kicker.contains(Capability::BanMembers));
        assert!(!Capabilities::empty().contains(Capability::Administrator));
    }
}
