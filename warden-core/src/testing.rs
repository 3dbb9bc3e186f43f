use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::{AuditAction, AuditRecord, AuditSink};
use crate::error::{DeliveryError, PlatformError};
use crate::guard::Capabilities;
use crate::id::{GuildId, RoleId, UserId};
use crate::platform::{Destination, GuildSummary, Member, Platform, RoleHandle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ApplyRole { user: UserId, role: String },
    RemoveRole { user: UserId, role: String },
    Timeout { user: UserId, seconds: u64 },
    Kick { user: UserId, reason: String },
    Ban { user: UserId, reason: String },
    Send { destination: Destination, content: String },
}

/// Recording platform with in-memory members and roles.
#[derive(Default)]
pub(crate) struct MockPlatform {
    members: Mutex<HashMap<UserId, Member>>,
    held_roles: Mutex<HashMap<UserId, HashSet<String>>>,
    created_roles: Mutex<Vec<String>>,
    blocked_dms: Mutex<HashSet<UserId>>,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<Call>>,
}

pub(crate) fn member(id: u64, rank: i64, capabilities: Capabilities) -> Member {
    Member {
        id: UserId::new(id),
        display_name: format!("user{id}"),
        nickname: None,
        rank,
        capabilities,
        is_bot: false,
        roles: Vec::new(),
        created_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap_or_default(),
        joined_at: DateTime::from_timestamp(1_650_000_000, 0),
    }
}

impl MockPlatform {
    pub(crate) fn add_member(&self, member: Member) {
        self.members.lock().unwrap().insert(member.id, member);
    }

    pub(crate) fn block_dms(&self, user: UserId) {
        self.blocked_dms.lock().unwrap().insert(user);
    }

    /// Make every later call of `operation` fail with a permissions error.
    pub(crate) fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub(crate) fn recover(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    pub(crate) fn grant_role(&self, user: UserId, role: &str) {
        self.held_roles
            .lock()
            .unwrap()
            .entry(user)
            .or_default()
            .insert(role.to_owned());
    }

    /// Take a role away without recording a call, as a human admin would.
    pub(crate) fn strip_role(&self, user: UserId, role: &str) {
        if let Some(roles) = self.held_roles.lock().unwrap().get_mut(&user) {
            roles.remove(role);
        }
    }

    pub(crate) fn holds_role(&self, user: UserId, role: &str) -> bool {
        self.held_roles
            .lock()
            .unwrap()
            .get(&user)
            .is_some_and(|roles| roles.contains(role))
    }

    pub(crate) fn created_roles(&self) -> Vec<String> {
        self.created_roles.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn messages_to(&self, destination: Destination) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send {
                    destination: sent_to,
                    content,
                } if sent_to == destination => Some(content),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count_role_removals(&self, user: UserId) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::RemoveRole { user: removed, .. } if *removed == user))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &'static str) -> Result<(), PlatformError> {
        if self.failing.lock().unwrap().contains(operation) {
            Err(PlatformError::missing_permissions(format!(
                "{operation}: Missing Permissions"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn member(&self, _guild: GuildId, user: UserId) -> Result<Option<Member>, PlatformError> {
        self.check("member")?;
        Ok(self.members.lock().unwrap().get(&user).cloned())
    }

    async fn guild_summary(&self, guild: GuildId) -> Result<GuildSummary, PlatformError> {
        self.check("guild_summary")?;
        Ok(GuildSummary {
            id: guild,
            name: "Test Guild".to_owned(),
            owner_id: UserId::new(1_000),
            created_at: DateTime::from_timestamp(1_500_000_000, 0).unwrap_or_default(),
            member_count: Some(self.members.lock().unwrap().len() as u64),
            channel_count: 4,
            role_count: 3,
        })
    }

    async fn send_message(
        &self,
        destination: Destination,
        content: &str,
    ) -> Result<(), DeliveryError> {
        if let Destination::Direct(user) = destination {
            if self.blocked_dms.lock().unwrap().contains(&user) {
                return Err(DeliveryError("Cannot send messages to this user".to_owned()));
            }
        }
        self.record(Call::Send {
            destination,
            content: content.to_owned(),
        });
        Ok(())
    }

    async fn get_or_create_role(
        &self,
        _guild: GuildId,
        name: &str,
    ) -> Result<RoleHandle, PlatformError> {
        self.check("get_or_create_role")?;
        let mut created = self.created_roles.lock().unwrap();
        let index = match created.iter().position(|existing| existing == name) {
            Some(index) => index,
            None => {
                created.push(name.to_owned());
                created.len() - 1
            }
        };
        Ok(RoleHandle {
            id: RoleId::new(500 + index as u64),
            name: name.to_owned(),
        })
    }

    async fn has_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: &RoleHandle,
    ) -> Result<bool, PlatformError> {
        self.check("has_role")?;
        Ok(self.holds_role(user, &role.name))
    }

    async fn apply_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: &RoleHandle,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.check("apply_role")?;
        self.grant_role(user, &role.name);
        self.record(Call::ApplyRole {
            user,
            role: role.name.clone(),
        });
        Ok(())
    }

    async fn remove_role(
        &self,
        _guild: GuildId,
        user: UserId,
        role: &RoleHandle,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.check("remove_role")?;
        self.strip_role(user, &role.name);
        self.record(Call::RemoveRole {
            user,
            role: role.name.clone(),
        });
        Ok(())
    }

    async fn timeout_subject(
        &self,
        _guild: GuildId,
        user: UserId,
        duration: Duration,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.check("timeout")?;
        self.record(Call::Timeout {
            user,
            seconds: duration.as_secs(),
        });
        Ok(())
    }

    async fn kick(&self, _guild: GuildId, user: UserId, reason: &str) -> Result<(), PlatformError> {
        self.check("kick")?;
        self.record(Call::Kick {
            user,
            reason: reason.to_owned(),
        });
        Ok(())
    }

    async fn ban(&self, _guild: GuildId, user: UserId, reason: &str) -> Result<(), PlatformError> {
        self.check("ban")?;
        self.record(Call::Ban {
            user,
            reason: reason.to_owned(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub(crate) fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn actions(&self) -> Vec<AuditAction> {
        self.records().iter().map(|record| record.action).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
