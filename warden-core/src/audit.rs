use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::id::{GuildId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Warn,
    Mute,
    Unmute,
    AutoUnmute,
    Kick,
    Ban,
    AutoTimeout,
    AutoBan,
    ClearWarnings,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::AutoUnmute => "auto_unmute",
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::AutoTimeout => "auto_timeout",
            Self::AutoBan => "auto_ban",
            Self::ClearWarnings => "clear_warnings",
        }
    }
}

/// One moderation action that actually happened.
#[derive(Clone, Debug, Serialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub guild_id: GuildId,
    pub actor_id: UserId,
    pub target_id: UserId,
    pub reason: String,
    pub duration_seconds: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        guild_id: GuildId,
        actor_id: UserId,
        target_id: UserId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action,
            guild_id,
            actor_id,
            target_id,
            reason: reason.into(),
            duration_seconds: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Writes each record as a structured event on the `warden::audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        info!(
            target: "warden::audit",
            action = record.action.as_str(),
            guild_id = %record.guild_id,
            actor_id = %record.actor_id,
            target_id = %record.target_id,
            duration_seconds = ?record.duration_seconds,
            timestamp = %record.timestamp.to_rfc3339(),
            reason = %record.reason,
            "moderation action"
        );
        Ok(())
    }
}

/// Forwards every record to each inner sink. One failing sink does not stop the rest.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn AuditSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(source) = sink.record(record).await {
                failures.push(format!("{source:#}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{} audit sink(s) failed: {}", failures.len(), failures.join("; "))
        }
    }
}

/// Fire-and-forget write: failures are logged locally and never reach the caller.
pub async fn emit(sink: &dyn AuditSink, record: AuditRecord) {
    if let Err(source) = sink.record(&record).await {
        warn!(
            action = record.action.as_str(),
            guild_id = %record.guild_id,
            target_id = %record.target_id,
            ?source,
            "failed to write audit record"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{AuditAction, AuditRecord, AuditSink, FanoutAuditSink, emit};
    use crate::id::{GuildId, UserId};
    use crate::testing::MemoryAuditSink;

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _record: &AuditRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn sample() -> AuditRecord {
        AuditRecord::new(
            AuditAction::AutoUnmute,
            GuildId::new(1),
            UserId::new(2),
            UserId::new(3),
            "Mute duration expired",
        )
        .with_duration(60)
    }

    #[test]
    fn serializes_snake_case_action() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["action"], "auto_unmute");
        assert_eq!(json["guild_id"], 1);
        assert_eq!(json["duration_seconds"], 60);
    }

    #[tokio::test]
    async fn fanout_reaches_healthy_sinks_past_a_broken_one() {
        let memory = Arc::new(MemoryAuditSink::default());
        let fanout = FanoutAuditSink::new(vec![Arc::new(BrokenSink), memory.clone()]);

        assert!(fanout.record(&sample()).await.is_err());
        assert_eq!(memory.actions(), vec![AuditAction::AutoUnmute]);

        // emit swallows the failure
        emit(&fanout, sample()).await;
        assert_eq!(memory.records().len(), 2);
    }
}
