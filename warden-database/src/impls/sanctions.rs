use anyhow::Context as _;
use async_trait::async_trait;

use warden_core::scheduler::{ActiveSanction, SanctionKind, SanctionStore};
use warden_core::{ChannelId, GuildId, UserId};
use warden_utils::time::from_unix_secs;

use crate::database::Database;

#[derive(sqlx::FromRow, Debug)]
struct SanctionRow {
    guild_id: i64,
    user_id: i64,
    kind: String,
    expires_at: i64,
    notice_channel_id: Option<i64>,
    generation: i64,
}

impl SanctionRow {
    fn into_sanction(self) -> anyhow::Result<ActiveSanction> {
        let kind = SanctionKind::parse(&self.kind)
            .with_context(|| format!("unknown sanction kind `{}`", self.kind))?;
        Ok(ActiveSanction {
            guild_id: GuildId::new(
                u64::try_from(self.guild_id).context("guild_id row out of u64 range")?,
            ),
            user_id: UserId::new(u64::try_from(self.user_id).context("user_id row out of u64 range")?),
            kind,
            expires_at: from_unix_secs(self.expires_at),
            notice_channel: self
                .notice_channel_id
                .map(u64::try_from)
                .transpose()
                .context("notice_channel_id row out of u64 range")?
                .map(ChannelId::new),
            generation: u64::try_from(self.generation).context("generation row out of u64 range")?,
        })
    }
}

fn key(guild: GuildId, user: UserId) -> anyhow::Result<(i64, i64)> {
    Ok((
        i64::try_from(guild.get()).context("guild_id out of i64 range")?,
        i64::try_from(user.get()).context("user_id out of i64 range")?,
    ))
}

/// Insert or replace the pending sanction for its `(guild, user, kind)`.
pub async fn save_sanction(db: &Database, sanction: &ActiveSanction) -> anyhow::Result<()> {
    let (guild_id_i64, user_id_i64) = key(sanction.guild_id, sanction.user_id)?;
    let notice_channel_i64 = sanction
        .notice_channel
        .map(|channel| i64::try_from(channel.get()))
        .transpose()
        .context("notice_channel_id out of i64 range")?;
    let generation_i64 = i64::try_from(sanction.generation).context("generation out of i64 range")?;

    sqlx::query(
        "INSERT INTO scheduled_sanctions (
            guild_id,
            user_id,
            kind,
            expires_at,
            notice_channel_id,
            generation
         ) VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (guild_id, user_id, kind) DO UPDATE
         SET expires_at = EXCLUDED.expires_at,
             notice_channel_id = EXCLUDED.notice_channel_id,
             generation = EXCLUDED.generation",
    )
    .bind(guild_id_i64)
    .bind(user_id_i64)
    .bind(sanction.kind.as_str())
    .bind(sanction.expires_at.timestamp())
    .bind(notice_channel_i64)
    .bind(generation_i64)
    .execute(db.pool())
    .await?;

    Ok(())
}

pub async fn delete_sanction(
    db: &Database,
    guild: GuildId,
    user: UserId,
    kind: SanctionKind,
) -> anyhow::Result<()> {
    let (guild_id_i64, user_id_i64) = key(guild, user)?;

    sqlx::query("DELETE FROM scheduled_sanctions WHERE guild_id = $1 AND user_id = $2 AND kind = $3")
        .bind(guild_id_i64)
        .bind(user_id_i64)
        .bind(kind.as_str())
        .execute(db.pool())
        .await?;

    Ok(())
}

/// Every pending sanction, soonest first. Rows that no longer parse are skipped.
pub async fn pending_sanctions(db: &Database) -> anyhow::Result<Vec<ActiveSanction>> {
    let rows: Vec<SanctionRow> = sqlx::query_as(
        "SELECT guild_id, user_id, kind, expires_at, notice_channel_id, generation
         FROM scheduled_sanctions
         ORDER BY expires_at ASC",
    )
    .fetch_all(db.pool())
    .await?;

    let mut sanctions = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_sanction() {
            Ok(sanction) => sanctions.push(sanction),
            Err(source) => tracing::warn!(?source, "skipping unreadable scheduled sanction"),
        }
    }

    Ok(sanctions)
}

/// Sanction store backed by the `scheduled_sanctions` table.
#[derive(Clone, Debug)]
pub struct PgSanctionStore {
    db: Database,
}

impl PgSanctionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SanctionStore for PgSanctionStore {
    async fn save(&self, sanction: &ActiveSanction) -> anyhow::Result<()> {
        save_sanction(&self.db, sanction).await
    }

    async fn remove(&self, guild: GuildId, user: UserId, kind: SanctionKind) -> anyhow::Result<()> {
        delete_sanction(&self.db, guild, user, kind).await
    }

    async fn load_all(&self) -> anyhow::Result<Vec<ActiveSanction>> {
        pending_sanctions(&self.db).await
    }
}
