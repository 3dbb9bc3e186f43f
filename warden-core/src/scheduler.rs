//! Timed sanctions that outlive the command that created them.
//!
//! Every timer is a detached task owned by the scheduler. Expiry and manual
//! lifts for one `(user, kind)` key run under the same per-key lock, and a
//! timer only acts if its generation is still the pending one, so a removal
//! happens at most once and only the winning path notifies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditAction, AuditRecord, AuditSink, emit};
use crate::error::{ModerationError, PlatformError};
use crate::guild::{GuildContext, GuildRegistry};
use crate::id::{ChannelId, GuildId, UserId};
use crate::platform::{Destination, Platform, RoleHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    /// Mute role; removed by the scheduler on expiry.
    Mute,
    /// Platform timeout; the platform lifts it, expiry only drops bookkeeping.
    Timeout,
}

impl SanctionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mute => "mute",
            Self::Timeout => "timeout",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mute" => Some(Self::Mute),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSanction {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub kind: SanctionKind,
    pub expires_at: DateTime<Utc>,
    /// Where the expiry notice goes, usually the channel the sanction was issued in.
    pub notice_channel: Option<ChannelId>,
    pub generation: u64,
}

type SanctionKey = (UserId, SanctionKind);

/// First wait before retrying a removal the platform rejected.
const RETRY_BASE: Duration = Duration::from_secs(30);
const RETRY_CAP: Duration = Duration::from_secs(60 * 60);

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE
        .saturating_mul(2_u32.saturating_pow(attempt))
        .min(RETRY_CAP)
}

#[derive(Debug)]
struct PendingSanction {
    sanction: ActiveSanction,
    timer: JoinHandle<()>,
}

/// Pending timed sanctions of one guild.
#[derive(Debug, Default)]
pub struct ActiveSanctions {
    pending: DashMap<SanctionKey, PendingSanction>,
    locks: DashMap<SanctionKey, Arc<Mutex<()>>>,
}

/// Exclusive hold on one `(user, kind)` key.
struct KeyGuard<'a> {
    sanctions: &'a ActiveSanctions,
    key: SanctionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.sanctions.prune_lock(self.key);
    }
}

impl ActiveSanctions {
    async fn lock_key(&self, key: SanctionKey) -> KeyGuard<'_> {
        let lock = Arc::clone(self.locks.entry(key).or_default().value());
        KeyGuard {
            sanctions: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Drop the key's lock once nothing is pending and nobody holds or waits on it.
    fn prune_lock(&self, key: SanctionKey) {
        if self.pending.contains_key(&key) {
            return;
        }
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn current(&self, key: SanctionKey, generation: u64) -> Option<ActiveSanction> {
        self.pending
            .get(&key)
            .filter(|pending| pending.sanction.generation == generation)
            .map(|pending| pending.sanction.clone())
    }

    /// Point the pending entry at a retry timer. The handle it replaces
    /// belongs to the task asking for the retry, so it is not aborted.
    fn retry(&self, key: SanctionKey, generation: u64, timer: JoinHandle<()>) {
        match self.pending.get_mut(&key) {
            Some(mut pending) if pending.sanction.generation == generation => {
                pending.timer = timer;
            }
            _ => timer.abort(),
        }
    }

    /// Remove the pending entry only if `generation` still owns it.
    fn take_if_current(&self, key: SanctionKey, generation: u64) -> Option<ActiveSanction> {
        self.pending
            .remove_if(&key, |_, pending| pending.sanction.generation == generation)
            .map(|(_, pending)| pending.sanction)
    }

    /// Remove and cancel whatever is pending for `key`.
    fn cancel(&self, key: SanctionKey) -> Option<ActiveSanction> {
        self.pending.remove(&key).map(|(_, pending)| {
            pending.timer.abort();
            pending.sanction
        })
    }

    fn replace(&self, key: SanctionKey, pending: PendingSanction) {
        if let Some(previous) = self.pending.insert(key, pending) {
            previous.timer.abort();
        }
    }

    pub fn get(&self, user: UserId, kind: SanctionKind) -> Option<ActiveSanction> {
        self.pending
            .get(&(user, kind))
            .map(|pending| pending.sanction.clone())
    }

    pub fn for_user(&self, user: UserId) -> Vec<ActiveSanction> {
        let mut sanctions: Vec<_> = self
            .pending
            .iter()
            .filter(|entry| entry.key().0 == user)
            .map(|entry| entry.sanction.clone())
            .collect();
        sanctions.sort_by_key(|sanction| sanction.expires_at);
        sanctions
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Persistence for pending sanctions so they survive a restart.
#[async_trait]
pub trait SanctionStore: Send + Sync {
    async fn save(&self, sanction: &ActiveSanction) -> anyhow::Result<()>;
    async fn remove(&self, guild: GuildId, user: UserId, kind: SanctionKind) -> anyhow::Result<()>;
    async fn load_all(&self) -> anyhow::Result<Vec<ActiveSanction>>;
}

/// Keeps nothing; sanctions are lost on restart.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSanctionStore;

#[async_trait]
impl SanctionStore for NoopSanctionStore {
    async fn save(&self, _sanction: &ActiveSanction) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove(
        &self,
        _guild: GuildId,
        _user: UserId,
        _kind: SanctionKind,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn load_all(&self) -> anyhow::Result<Vec<ActiveSanction>> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    Lifted,
    /// The user did not hold the mute role.
    AlreadyAbsent,
}

struct SchedulerInner {
    registry: GuildRegistry,
    platform: Arc<dyn Platform>,
    audit: Arc<dyn AuditSink>,
    store: Arc<dyn SanctionStore>,
    mute_role_name: String,
    bot_user: UserId,
    generation: AtomicU64,
}

#[derive(Clone)]
pub struct SanctionScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for SanctionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanctionScheduler")
            .field("mute_role_name", &self.inner.mute_role_name)
            .field("bot_user", &self.inner.bot_user)
            .finish_non_exhaustive()
    }
}

impl SanctionScheduler {
    pub fn new(
        registry: GuildRegistry,
        platform: Arc<dyn Platform>,
        audit: Arc<dyn AuditSink>,
        store: Arc<dyn SanctionStore>,
        mute_role_name: impl Into<String>,
        bot_user: UserId,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                registry,
                platform,
                audit,
                store,
                mute_role_name: mute_role_name.into(),
                bot_user,
                generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn mute_role_name(&self) -> &str {
        &self.inner.mute_role_name
    }

    pub async fn mute_role(&self, guild: GuildId) -> Result<RoleHandle, ModerationError> {
        self.inner
            .platform
            .get_or_create_role(guild, &self.inner.mute_role_name)
            .await
            .map_err(|source| ModerationError::platform("mute", source))
    }

    /// Apply the mute role and arm its removal, replacing any pending mute.
    pub async fn apply_mute(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        notice_channel: Option<ChannelId>,
        reason: &str,
    ) -> Result<ActiveSanction, ModerationError> {
        let context = self.inner.registry.context(guild);
        let key = (user, SanctionKind::Mute);
        let _held = context.sanctions.lock_key(key).await;

        let role = self.mute_role(guild).await?;
        self.inner
            .platform
            .apply_role(guild, user, &role, reason)
            .await
            .map_err(|source| ModerationError::platform("mute", source))?;

        Ok(self
            .schedule_locked(&context, user, SanctionKind::Mute, duration, notice_channel)
            .await)
    }

    /// Arrange for the sanction to be removed after `delay`.
    ///
    /// Returns immediately; the removal runs on its own task.
    pub async fn schedule_timed_removal(
        &self,
        guild: GuildId,
        user: UserId,
        kind: SanctionKind,
        delay: Duration,
        notice_channel: Option<ChannelId>,
    ) -> ActiveSanction {
        let context = self.inner.registry.context(guild);
        let _held = context.sanctions.lock_key((user, kind)).await;
        self.schedule_locked(&context, user, kind, delay, notice_channel)
            .await
    }

    async fn schedule_locked(
        &self,
        context: &GuildContext,
        user: UserId,
        kind: SanctionKind,
        delay: Duration,
        notice_channel: Option<ChannelId>,
    ) -> ActiveSanction {
        let sanction = ActiveSanction {
            guild_id: context.guild_id,
            user_id: user,
            kind,
            expires_at: TimeDelta::from_std(delay)
                .ok()
                .and_then(|delay| Utc::now().checked_add_signed(delay))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            notice_channel,
            generation: self.inner.generation.fetch_add(1, Ordering::Relaxed),
        };

        if let Err(source) = self.inner.store.save(&sanction).await {
            warn!(
                guild_id = %sanction.guild_id,
                user_id = %user,
                kind = kind.as_str(),
                ?source,
                "failed to persist sanction; it will not survive a restart"
            );
        }

        self.arm(context, sanction.clone(), delay);
        sanction
    }

    /// Spawn the timer. Callers hold the key lock, so even a zero delay
    /// cannot expire before the entry is inserted.
    fn arm(&self, context: &GuildContext, sanction: ActiveSanction, delay: Duration) {
        let key = (sanction.user_id, sanction.kind);
        let timer = self.spawn_timer(&sanction, delay, 0);
        context
            .sanctions
            .replace(key, PendingSanction { sanction, timer });
    }

    fn spawn_timer(&self, sanction: &ActiveSanction, delay: Duration, attempt: u32) -> JoinHandle<()> {
        let scheduler = self.clone();
        let guild = sanction.guild_id;
        let user = sanction.user_id;
        let kind = sanction.kind;
        let generation = sanction.generation;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.expire(guild, user, kind, generation, attempt).await;
        })
    }

    /// The entry and its persisted row stay until the removal has gone
    /// through, so a failed removal is retried here or after a restart.
    async fn expire(
        &self,
        guild: GuildId,
        user: UserId,
        kind: SanctionKind,
        generation: u64,
        attempt: u32,
    ) {
        let context = self.inner.registry.context(guild);
        let key = (user, kind);
        let _held = context.sanctions.lock_key(key).await;

        let Some(sanction) = context.sanctions.current(key, generation) else {
            debug!(guild_id = %guild, user_id = %user, kind = kind.as_str(), "sanction already lifted");
            return;
        };

        let lifted = match kind {
            SanctionKind::Timeout => {
                debug!(guild_id = %guild, user_id = %user, "timeout elapsed");
                false
            }
            SanctionKind::Mute => match self.remove_expired_mute(&sanction).await {
                Ok(lifted) => lifted,
                Err(source) => {
                    let delay = retry_delay(attempt);
                    error!(
                        guild_id = %guild,
                        user_id = %user,
                        attempt,
                        retry_in_secs = delay.as_secs(),
                        ?source,
                        "failed to lift expired mute"
                    );
                    let timer = self.spawn_timer(&sanction, delay, attempt.saturating_add(1));
                    context.sanctions.retry(key, generation, timer);
                    return;
                }
            },
        };

        context.sanctions.take_if_current(key, generation);
        self.forget(&sanction).await;

        if lifted {
            self.announce_unmute(&sanction).await;
        }
    }

    /// Take the mute role off. `Ok(false)` means it was already gone.
    async fn remove_expired_mute(&self, sanction: &ActiveSanction) -> Result<bool, PlatformError> {
        let platform = &self.inner.platform;
        let guild = sanction.guild_id;
        let user = sanction.user_id;

        let role = platform
            .get_or_create_role(guild, &self.inner.mute_role_name)
            .await?;
        if !platform.has_role(guild, user, &role).await? {
            debug!(guild_id = %guild, user_id = %user, "mute role already gone at expiry");
            return Ok(false);
        }
        platform
            .remove_role(guild, user, &role, "Mute duration expired")
            .await?;
        Ok(true)
    }

    async fn announce_unmute(&self, sanction: &ActiveSanction) {
        let platform = &self.inner.platform;
        let guild = sanction.guild_id;
        let user = sanction.user_id;

        info!(guild_id = %guild, user_id = %user, "mute expired");
        if let Some(channel) = sanction.notice_channel {
            let notice = format!("✅ {} has been automatically unmuted", user.mention());
            if let Err(source) = platform
                .send_message(Destination::Channel(channel), &notice)
                .await
            {
                warn!(guild_id = %guild, channel_id = %channel, ?source, "failed to post unmute notice");
            }
        }

        emit(
            self.inner.audit.as_ref(),
            AuditRecord::new(
                AuditAction::AutoUnmute,
                guild,
                self.inner.bot_user,
                user,
                "Mute duration expired",
            ),
        )
        .await;
    }

    /// Manually lift a mute. Any pending timer for it is cancelled and would
    /// find nothing to do if it had already woken.
    pub async fn lift_mute(
        &self,
        guild: GuildId,
        user: UserId,
        reason: &str,
    ) -> Result<Release, ModerationError> {
        let context = self.inner.registry.context(guild);
        let key = (user, SanctionKind::Mute);
        let _held = context.sanctions.lock_key(key).await;

        let platform = &self.inner.platform;
        let fail = |source| ModerationError::platform("unmute", source);
        let role = platform
            .get_or_create_role(guild, &self.inner.mute_role_name)
            .await
            .map_err(fail)?;
        let held = platform.has_role(guild, user, &role).await.map_err(fail)?;

        if held {
            platform
                .remove_role(guild, user, &role, reason)
                .await
                .map_err(fail)?;
        }

        if let Some(sanction) = context.sanctions.cancel(key) {
            self.forget(&sanction).await;
        }

        Ok(if held {
            Release::Lifted
        } else {
            Release::AlreadyAbsent
        })
    }

    /// Drop a pending sanction without touching the platform.
    pub async fn cancel(&self, guild: GuildId, user: UserId, kind: SanctionKind) -> bool {
        let context = self.inner.registry.context(guild);
        let _held = context.sanctions.lock_key((user, kind)).await;

        match context.sanctions.cancel((user, kind)) {
            Some(sanction) => {
                self.forget(&sanction).await;
                true
            }
            None => false,
        }
    }

    /// Re-arm persisted sanctions. Overdue ones fire right away.
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let sanctions = self.inner.store.load_all().await?;
        let now = Utc::now();
        let count = sanctions.len();

        for sanction in sanctions {
            self.inner
                .generation
                .fetch_max(sanction.generation.saturating_add(1), Ordering::Relaxed);

            let context = self.inner.registry.context(sanction.guild_id);
            let _held = context
                .sanctions
                .lock_key((sanction.user_id, sanction.kind))
                .await;

            let delay = (sanction.expires_at - now).to_std().unwrap_or(Duration::ZERO);
            self.arm(&context, sanction, delay);
        }

        if count > 0 {
            info!(count, "restored pending sanctions");
        }
        Ok(count)
    }

    pub fn active(&self, guild: GuildId, user: UserId) -> Vec<ActiveSanction> {
        self.inner
            .registry
            .get(guild)
            .map(|context| context.sanctions.for_user(user))
            .unwrap_or_default()
    }

    async fn forget(&self, sanction: &ActiveSanction) {
        if let Err(source) = self
            .inner
            .store
            .remove(sanction.guild_id, sanction.user_id, sanction.kind)
            .await
        {
            warn!(
                guild_id = %sanction.guild_id,
                user_id = %sanction.user_id,
                kind = sanction.kind.as_str(),
                ?source,
                "failed to drop persisted sanction"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};

    use super::{
        ActiveSanction, NoopSanctionStore, RETRY_BASE, Release, SanctionKind, SanctionScheduler,
        SanctionStore, retry_delay,
    };
    use crate::audit::AuditAction;
    use crate::guild::GuildRegistry;
    use crate::id::{ChannelId, GuildId, UserId};
    use crate::platform::Destination;
    use crate::testing::{MemoryAuditSink, MockPlatform};

    const GUILD: GuildId = GuildId::new(10);
    const USER: UserId = UserId::new(20);
    const CHANNEL: ChannelId = ChannelId::new(30);
    const BOT: UserId = UserId::new(1);

    struct Harness {
        platform: Arc<MockPlatform>,
        audit: Arc<MemoryAuditSink>,
        scheduler: SanctionScheduler,
    }

    fn harness_with_store(store: Arc<dyn SanctionStore>) -> Harness {
        let platform = Arc::new(MockPlatform::default());
        let audit = Arc::new(MemoryAuditSink::default());
        let scheduler = SanctionScheduler::new(
            GuildRegistry::new(Duration::from_secs(5), 5),
            platform.clone(),
            audit.clone(),
            store,
            "Muted",
            BOT,
        );
        Harness {
            platform,
            audit,
            scheduler,
        }
    }

    fn harness() -> Harness {
        harness_with_store(Arc::new(NoopSanctionStore))
    }

    fn unmute_notices(platform: &MockPlatform) -> usize {
        platform
            .messages_to(Destination::Channel(CHANNEL))
            .iter()
            .filter(|content| content.contains("automatically unmuted"))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn mute_expires_once_with_notice_and_audit() {
        let h = harness();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(60), Some(CHANNEL), "spam")
            .await
            .unwrap();
        assert!(h.platform.holds_role(USER, "Muted"));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(h.platform.holds_role(USER, "Muted"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!h.platform.holds_role(USER, "Muted"));
        assert_eq!(unmute_notices(&h.platform), 1);
        assert_eq!(h.audit.actions(), vec![AuditAction::AutoUnmute]);
        assert_eq!(h.audit.records()[0].actor_id, BOT);
        assert!(h.scheduler.active(GUILD, USER).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_lift_wins_over_pending_timer() {
        let h = harness();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(60), Some(CHANNEL), "spam")
            .await
            .unwrap();

        let released = h.scheduler.lift_mute(GUILD, USER, "Unmute command issued").await;
        assert_eq!(released.unwrap(), Release::Lifted);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(unmute_notices(&h.platform), 0);
        assert_eq!(h.platform.count_role_removals(USER), 1);
        assert!(h.audit.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_a_no_op_when_role_was_removed_elsewhere() {
        let h = harness();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(60), Some(CHANNEL), "spam")
            .await
            .unwrap();
        h.platform.strip_role(USER, "Muted");

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(unmute_notices(&h.platform), 0);
        assert_eq!(h.platform.count_role_removals(USER), 0);
        assert!(h.audit.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remuting_replaces_the_previous_timer() {
        let h = harness();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(30), Some(CHANNEL), "first")
            .await
            .unwrap();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(300), Some(CHANNEL), "second")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(h.platform.holds_role(USER, "Muted"));
        assert_eq!(h.scheduler.active(GUILD, USER).len(), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!h.platform.holds_role(USER, "Muted"));
        assert_eq!(unmute_notices(&h.platform), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_expiry_only_drops_bookkeeping() {
        let h = harness();
        h.scheduler
            .schedule_timed_removal(
                GUILD,
                USER,
                SanctionKind::Timeout,
                Duration::from_secs(600),
                Some(CHANNEL),
            )
            .await;
        assert_eq!(h.scheduler.active(GUILD, USER).len(), 1);

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(h.scheduler.active(GUILD, USER).is_empty());
        assert!(h.platform.calls().is_empty());
        assert!(h.audit.records().is_empty());
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<ActiveSanction>>,
    }

    #[async_trait]
    impl SanctionStore for RecordingStore {
        async fn save(&self, sanction: &ActiveSanction) -> anyhow::Result<()> {
            let mut saved = self.saved.lock().unwrap();
            let key = (sanction.guild_id, sanction.user_id, sanction.kind);
            saved.retain(|s| (s.guild_id, s.user_id, s.kind) != key);
            saved.push(sanction.clone());
            Ok(())
        }

        async fn remove(
            &self,
            guild: GuildId,
            user: UserId,
            kind: SanctionKind,
        ) -> anyhow::Result<()> {
            self.saved
                .lock()
                .unwrap()
                .retain(|s| (s.guild_id, s.user_id, s.kind) != (guild, user, kind));
            Ok(())
        }

        async fn load_all(&self) -> anyhow::Result<Vec<ActiveSanction>> {
            Ok(self.saved.lock().unwrap().clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restore_fires_overdue_sanctions_and_keeps_generations_fresh() {
        let store = Arc::new(RecordingStore::default());
        store.saved.lock().unwrap().push(ActiveSanction {
            guild_id: GUILD,
            user_id: USER,
            kind: SanctionKind::Mute,
            expires_at: Utc::now() - TimeDelta::minutes(5),
            notice_channel: Some(CHANNEL),
            generation: 41,
        });

        let h = harness_with_store(store.clone());
        h.platform.grant_role(USER, "Muted");

        assert_eq!(h.scheduler.restore().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!h.platform.holds_role(USER, "Muted"));
        assert_eq!(unmute_notices(&h.platform), 1);
        assert!(store.saved.lock().unwrap().is_empty());

        let next = h
            .scheduler
            .schedule_timed_removal(GUILD, USER, SanctionKind::Timeout, Duration::from_secs(5), None)
            .await;
        assert!(next.generation > 41);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    fn tracked_locks(h: &Harness) -> usize {
        h.scheduler
            .inner
            .registry
            .get(GUILD)
            .map_or(0, |context| context.sanctions.tracked_locks())
    }

    #[test]
    fn retry_delay_doubles_up_to_an_hour() {
        assert_eq!(retry_delay(0), RETRY_BASE);
        assert_eq!(retry_delay(1), Duration::from_secs(60));
        assert_eq!(retry_delay(40), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_expiry_is_retried_until_the_role_is_lifted() {
        let store = Arc::new(RecordingStore::default());
        let h = harness_with_store(store.clone());
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(60), Some(CHANNEL), "spam")
            .await
            .unwrap();
        h.platform.fail("remove_role");

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(h.platform.holds_role(USER, "Muted"));
        assert_eq!(h.scheduler.active(GUILD, USER).len(), 1);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert_eq!(unmute_notices(&h.platform), 0);

        // still failing on the first retry
        tokio::time::sleep(RETRY_BASE).await;
        assert!(h.platform.holds_role(USER, "Muted"));

        h.platform.recover("remove_role");
        tokio::time::sleep(retry_delay(1)).await;
        assert!(!h.platform.holds_role(USER, "Muted"));
        assert!(h.scheduler.active(GUILD, USER).is_empty());
        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(unmute_notices(&h.platform), 1);
        assert_eq!(h.audit.actions(), vec![AuditAction::AutoUnmute]);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_lift_cancels_a_pending_retry() {
        let h = harness();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(60), Some(CHANNEL), "spam")
            .await
            .unwrap();
        h.platform.fail("remove_role");
        tokio::time::sleep(Duration::from_secs(61)).await;

        h.platform.recover("remove_role");
        let released = h.scheduler.lift_mute(GUILD, USER, "Unmute command issued").await;
        assert_eq!(released.unwrap(), Release::Lifted);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(h.platform.count_role_removals(USER), 1);
        assert_eq!(unmute_notices(&h.platform), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn key_locks_are_dropped_once_nothing_is_pending() {
        let h = harness();
        h.scheduler
            .apply_mute(GUILD, USER, Duration::from_secs(60), Some(CHANNEL), "spam")
            .await
            .unwrap();
        h.scheduler
            .schedule_timed_removal(GUILD, USER, SanctionKind::Timeout, Duration::from_secs(30), None)
            .await;
        assert_eq!(tracked_locks(&h), 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(tracked_locks(&h), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(tracked_locks(&h), 0);

        assert!(!h.scheduler.cancel(GUILD, USER, SanctionKind::Mute).await);
        assert_eq!(tracked_locks(&h), 0);
    }
}
