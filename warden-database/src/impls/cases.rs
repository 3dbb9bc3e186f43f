use anyhow::Context as _;
use async_trait::async_trait;

use warden_core::audit::{AuditRecord, AuditSink};

use crate::database::Database;

#[derive(Debug, PartialEq, Eq)]
struct CaseRow<'a> {
    guild_id: i64,
    target_user_id: i64,
    moderator_user_id: i64,
    action: &'a str,
    reason: &'a str,
    duration_seconds: Option<i64>,
    created_at: i64,
}

impl<'a> CaseRow<'a> {
    fn from_record(record: &'a AuditRecord) -> anyhow::Result<Self> {
        Ok(Self {
            guild_id: i64::try_from(record.guild_id.get()).context("guild_id out of i64 range")?,
            target_user_id: i64::try_from(record.target_id.get())
                .context("target_user_id out of i64 range")?,
            moderator_user_id: i64::try_from(record.actor_id.get())
                .context("moderator_user_id out of i64 range")?,
            action: record.action.as_str(),
            reason: &record.reason,
            duration_seconds: record
                .duration_seconds
                .map(i64::try_from)
                .transpose()
                .context("duration_seconds out of i64 range")?,
            created_at: record.timestamp.timestamp(),
        })
    }
}

/// Insert one moderation case and return its row id.
pub async fn record_case(db: &Database, record: &AuditRecord) -> anyhow::Result<i64> {
    let row = CaseRow::from_record(record)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO mod_cases (
            guild_id,
            target_user_id,
            moderator_user_id,
            action,
            reason,
            duration_seconds,
            created_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id",
    )
    .bind(row.guild_id)
    .bind(row.target_user_id)
    .bind(row.moderator_user_id)
    .bind(row.action)
    .bind(row.reason)
    .bind(row.duration_seconds)
    .bind(row.created_at)
    .fetch_one(db.pool())
    .await?;

    Ok(id)
}

/// Audit sink that keeps every moderation action in `mod_cases`.
#[derive(Clone, Debug)]
pub struct PgAuditSink {
    db: Database,
}

impl PgAuditSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let id = record_case(&self.db, record).await?;
        tracing::debug!(case_id = id, action = record.action.as_str(), "stored moderation case");
        Ok(())
    }
}
