//! `TxRegistry`: process-wide store of watched transactions.
//!
//! Every entry owns exactly one watch task (stream, then polling fallback)
//! through a cancellation token. All mutation primitives take the map lock
//! for their whole read-modify-write and never await while holding it;
//! notifier callbacks and broadcasts happen after the lock is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::WatcherConfig;
use crate::event::{CompletePayload, TxEvent};
use crate::notify::{Notification, Notifier, CONFIRMED_PENDING_MESSAGE};
use crate::observer::TxObserver;
use crate::status::{NotificationTemplate, TxHash, TxState, TxStatus, TxType};
use crate::transport::StatusSource;
use crate::watch;

/// Change broadcast to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum TxUpdate {
    /// An accepted status change.
    Status {
        tx_hash: TxHash,
        status: TxStatus,
        is_terminal: bool,
    },
    /// The entry left the registry (unregistered, evicted, cleared or expired).
    Removed { tx_hash: TxHash },
}

impl TxUpdate {
    pub fn tx_hash(&self) -> &TxHash {
        match self {
            Self::Status { tx_hash, .. } | Self::Removed { tx_hash } => tx_hash,
        }
    }
}

/// Read-only copy of a registry entry.
#[derive(Debug, Clone)]
pub struct WatchedTxSnapshot {
    pub tx_hash: TxHash,
    pub tx_type: TxType,
    pub status: Option<TxStatus>,
    pub is_terminal: bool,
    pub subscriber_count: u32,
    pub template: NotificationTemplate,
    pub registered_at: Instant,
    /// `true` while the stream or poll loop is still running.
    pub is_connected: bool,
}

/// Who owes the user the completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotificationDuty {
    /// Not terminal yet.
    Unresolved,
    /// Terminal while only observers were mounted; one of them claims it.
    Deferred,
    /// Terminal while a subscriber outside any observer was mounted; that
    /// subscriber shows it and the registry never does.
    Suppressed,
    /// Already shown.
    Delivered,
}

struct Entry {
    /// Generation of this watch; a re-registered hash gets a new one.
    watch_id: u64,
    tx_type: TxType,
    status: Option<TxStatus>,
    is_terminal: bool,
    subscriber_count: u32,
    /// Share of `subscriber_count` held by [`TxObserver`]s.
    observer_count: u32,
    template: NotificationTemplate,
    registered_at: Instant,
    connection: Option<CancellationToken>,
    duty: NotificationDuty,
}

impl Entry {
    fn snapshot(&self, tx_hash: &TxHash) -> WatchedTxSnapshot {
        WatchedTxSnapshot {
            tx_hash: tx_hash.clone(),
            tx_type: self.tx_type.clone(),
            status: self.status.clone(),
            is_terminal: self.is_terminal,
            subscriber_count: self.subscriber_count,
            template: self.template.clone(),
            registered_at: self.registered_at,
            is_connected: self.connection.is_some(),
        }
    }

    fn release_connection(&mut self) {
        if let Some(token) = self.connection.take() {
            token.cancel();
        }
    }

    /// Hand the deferred notification to the caller, at most once.
    fn take_deferred(&mut self, tx_hash: &TxHash) -> Option<Notification> {
        if self.duty != NotificationDuty::Deferred {
            return None;
        }
        let status = self.status.as_ref()?;
        self.duty = NotificationDuty::Delivered;
        Some(Notification::for_terminal(tx_hash, &self.template, status))
    }
}

/// What a watch task should do after handing the registry an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    /// Keep reading.
    Continue,
    /// Terminal, unregistered or superseded; stop.
    Finished,
}

struct Inner {
    source: Arc<dyn StatusSource>,
    notifier: Arc<dyn Notifier>,
    config: WatcherConfig,
    entries: Mutex<HashMap<TxHash, Entry>>,
    auth_token: RwLock<Option<String>>,
    updates: broadcast::Sender<TxUpdate>,
    next_watch_id: AtomicU64,
    /// Stops the sweeper and pending removal timers on `dispose()`.
    shutdown: CancellationToken,
}

/// Process-wide transaction watcher.
///
/// Cheap to clone; every clone shares the same map. Methods that start
/// background work (`register`, `spawn_sweeper`) must be called from within
/// a Tokio runtime.
#[derive(Clone)]
pub struct TxRegistry {
    inner: Arc<Inner>,
}

impl TxRegistry {
    pub fn new(
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
        config: WatcherConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(config.update_channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                source,
                notifier,
                config,
                entries: Mutex::new(HashMap::new()),
                auth_token: RwLock::new(None),
                updates,
                next_watch_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start watching `tx_hash`. A no-op if it is already tracked.
    pub fn register(&self, tx_hash: TxHash, tx_type: TxType, template: NotificationTemplate) {
        let cancel = CancellationToken::new();
        let registered_at = Instant::now();
        let watch_id = {
            let mut entries = self.entries();
            if entries.contains_key(&tx_hash) {
                tracing::debug!(tx_hash = %tx_hash, "already watching");
                return;
            }
            let watch_id = self.inner.next_watch_id.fetch_add(1, Ordering::Relaxed);
            entries.insert(
                tx_hash.clone(),
                Entry {
                    watch_id,
                    tx_type: tx_type.clone(),
                    status: None,
                    is_terminal: false,
                    subscriber_count: 0,
                    observer_count: 0,
                    template,
                    registered_at,
                    connection: Some(cancel.clone()),
                    duty: NotificationDuty::Unresolved,
                },
            );
            watch_id
        };

        tracing::info!(tx_hash = %tx_hash, tx_type = %tx_type, "watching transaction");

        let deadline = registered_at + self.inner.config.max_age();
        tokio::spawn(watch::run(self.clone(), tx_hash, watch_id, deadline, cancel));
    }

    /// Stop watching `tx_hash` and drop its entry. No notification follows.
    pub fn unregister(&self, tx_hash: &TxHash) {
        let removed = self.entries().remove(tx_hash);
        if let Some(mut entry) = removed {
            entry.release_connection();
            tracing::debug!(tx_hash = %tx_hash, "unregistered");
            self.announce_removed(tx_hash.clone());
        }
    }

    /// Mark a view as mounted on `tx_hash`. While any subscriber is mounted
    /// when the transaction finishes, the registry does not notify; the
    /// subscriber shows the outcome itself.
    pub fn increment_subscriber(&self, tx_hash: &TxHash) {
        if let Some(entry) = self.entries().get_mut(tx_hash) {
            entry.subscriber_count += 1;
        }
    }

    /// Floors at zero. Never produces a notification.
    pub fn decrement_subscriber(&self, tx_hash: &TxHash) {
        if let Some(entry) = self.entries().get_mut(tx_hash) {
            entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        }
    }

    /// Count an observer as a subscriber. Returns `false` if `tx_hash` is not
    /// tracked.
    pub(crate) fn attach_observer(&self, tx_hash: &TxHash) -> bool {
        match self.entries().get_mut(tx_hash) {
            Some(entry) => {
                entry.subscriber_count += 1;
                entry.observer_count += 1;
                true
            }
            None => false,
        }
    }

    /// If the last observer leaves before claiming a deferred notification,
    /// the registry delivers it instead.
    pub(crate) fn detach_observer(&self, tx_hash: &TxHash) {
        let orphaned = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(tx_hash) else {
                return;
            };
            entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
            entry.observer_count = entry.observer_count.saturating_sub(1);
            if entry.observer_count == 0 {
                entry.take_deferred(tx_hash)
            } else {
                None
            }
        };
        if let Some(notification) = orphaned {
            tracing::debug!(tx_hash = %tx_hash, "last observer left before notifying");
            self.inner.notifier.notify(notification);
        }
    }

    pub fn get_watched_tx(&self, tx_hash: &TxHash) -> Option<WatchedTxSnapshot> {
        self.entries().get(tx_hash).map(|e| e.snapshot(tx_hash))
    }

    /// Number of tracked transactions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the bearer token used by connections opened from now on.
    ///
    /// Streams that are already open keep the token they were opened with.
    pub fn update_auth_token(&self, token: Option<String>) {
        *self
            .inner
            .auth_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub(crate) fn auth_token(&self) -> Option<String> {
        self.inner
            .auth_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Evict entries older than `max_age`, cancelling their watch first.
    /// A finished entry whose observers never claimed its notification gets
    /// it delivered here. Returns how many were evicted.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let max_age = self.inner.config.max_age();
        let mut evicted = Vec::new();
        self.entries().retain(|tx_hash, entry| {
            if now.duration_since(entry.registered_at) <= max_age {
                return true;
            }
            entry.release_connection();
            tracing::info!(tx_hash = %tx_hash, "evicting stale watch");
            evicted.push((tx_hash.clone(), entry.take_deferred(tx_hash)));
            false
        });
        let count = evicted.len();
        for (tx_hash, unclaimed) in evicted {
            if let Some(notification) = unclaimed {
                self.inner.notifier.notify(notification);
            }
            self.announce_removed(tx_hash);
        }
        count
    }

    /// Cancel every watch and empty the registry (e.g. on sign-out).
    pub fn clear_all(&self) {
        let drained: Vec<(TxHash, Entry)> = self.entries().drain().collect();
        let count = drained.len();
        for (tx_hash, mut entry) in drained {
            entry.release_connection();
            self.announce_removed(tx_hash);
        }
        if count > 0 {
            tracing::info!(count, "cleared all watches");
        }
    }

    /// Stop the sweeper and removal timers, then `clear_all()`.
    pub fn dispose(&self) {
        self.inner.shutdown.cancel();
        self.clear_all();
    }

    /// Run `cleanup()` every `sweep_interval` until `dispose()`.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let shutdown = self.inner.shutdown.clone();
        let period = self.inner.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = registry.cleanup();
                        if evicted > 0 {
                            tracing::debug!(evicted, "staleness sweep");
                        }
                    }
                }
            }
        })
    }

    /// Receive every accepted status change, for all transactions.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<TxUpdate> {
        self.inner.updates.subscribe()
    }

    /// Attach an observer to `tx_hash`, counting it as a subscriber until dropped.
    /// Returns `None` if the hash is not tracked.
    pub fn observe(&self, tx_hash: &TxHash) -> Option<TxObserver> {
        TxObserver::attach(self.clone(), tx_hash.clone())
    }

    pub(crate) fn config(&self) -> &WatcherConfig {
        &self.inner.config
    }

    pub(crate) fn source(&self) -> &Arc<dyn StatusSource> {
        &self.inner.source
    }

    /// Drop the connection token of a watch that stopped on its own, keeping
    /// the entry for the sweep.
    pub(crate) fn release_watch(&self, tx_hash: &TxHash, watch_id: u64) {
        if let Some(entry) = self.entries().get_mut(tx_hash) {
            if entry.watch_id == watch_id {
                entry.connection = None;
            }
        }
    }

    /// Give a mounted observer the deferred notification, at most once overall.
    pub(crate) fn claim_notification(&self, tx_hash: &TxHash) -> Option<Notification> {
        self.entries()
            .get_mut(tx_hash)
            .and_then(|entry| entry.take_deferred(tx_hash))
    }

    /// Apply a decoded stream event.
    pub(crate) fn apply_event(&self, tx_hash: &TxHash, watch_id: u64, event: TxEvent) -> Applied {
        match event {
            TxEvent::State(status) => self.apply_status(tx_hash, watch_id, status),
            TxEvent::StateChange { new_state } => self.transition(tx_hash, watch_id, false, |entry| {
                match &entry.status {
                    Some(current) => TxStatus {
                        state: new_state,
                        ..current.clone()
                    },
                    None => TxStatus {
                        tx_hash: Some(tx_hash.clone()),
                        tx_type: Some(entry.tx_type.clone()),
                        ..TxStatus::with_state(new_state)
                    },
                }
            }),
            TxEvent::Complete(payload) => self.apply_complete(tx_hash, watch_id, payload),
        }
    }

    /// Apply a full snapshot (a `state` event or a poll response).
    pub(crate) fn apply_status(&self, tx_hash: &TxHash, watch_id: u64, status: TxStatus) -> Applied {
        self.transition(tx_hash, watch_id, false, |_| status)
    }

    fn apply_complete(&self, tx_hash: &TxHash, watch_id: u64, payload: CompletePayload) -> Applied {
        self.transition(tx_hash, watch_id, true, |entry| {
            let previous = entry.status.as_ref();
            TxStatus {
                tx_hash: Some(tx_hash.clone()),
                tx_type: payload
                    .tx_type
                    .or_else(|| previous.and_then(|s| s.tx_type.clone()))
                    .or_else(|| Some(entry.tx_type.clone())),
                state: payload.final_state,
                retry_count: previous.map_or(0, |s| s.retry_count),
                confirmed_at: payload
                    .confirmed_at
                    .or_else(|| previous.and_then(|s| s.confirmed_at.clone())),
                last_error: payload.last_error,
            }
        })
    }

    /// Shared read-modify-write for every status mutation.
    ///
    /// `finalize` forces the entry terminal whatever the new state is.
    fn transition(
        &self,
        tx_hash: &TxHash,
        watch_id: u64,
        finalize: bool,
        next: impl FnOnce(&Entry) -> TxStatus,
    ) -> Applied {
        let (status, terminal, entered_confirmed, notification) = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(tx_hash) else {
                return Applied::Finished;
            };
            if entry.watch_id != watch_id || entry.is_terminal {
                return Applied::Finished;
            }

            let status = next(entry);
            let previous_state = entry.status.as_ref().map(|s| s.state);
            let terminal = finalize || status.is_terminal();

            if !terminal && previous_state.is_some_and(|p| p.rank() > status.state.rank()) {
                tracing::debug!(
                    tx_hash = %tx_hash,
                    state = %status.state,
                    "ignoring backward state transition"
                );
                return Applied::Continue;
            }

            let entered_confirmed =
                status.state == TxState::Confirmed && previous_state != Some(TxState::Confirmed);
            entry.status = Some(status.clone());

            let mut notification = None;
            if terminal {
                entry.is_terminal = true;
                entry.release_connection();
                if entry.subscriber_count == 0 {
                    entry.duty = NotificationDuty::Delivered;
                    notification = Some(Notification::for_terminal(tx_hash, &entry.template, &status));
                } else if entry.observer_count >= entry.subscriber_count {
                    entry.duty = NotificationDuty::Deferred;
                } else {
                    entry.duty = NotificationDuty::Suppressed;
                }
            }

            (status, terminal, entered_confirmed, notification)
        };

        tracing::debug!(tx_hash = %tx_hash, state = %status.state, "status updated");
        let final_state = status.state;
        // no receivers is fine
        let _ = self.inner.updates.send(TxUpdate::Status {
            tx_hash: tx_hash.clone(),
            status,
            is_terminal: terminal,
        });

        if entered_confirmed && !terminal {
            self.inner.notifier.update_pending(tx_hash, CONFIRMED_PENDING_MESSAGE);
        }
        if !terminal {
            return Applied::Continue;
        }

        tracing::info!(tx_hash = %tx_hash, state = %final_state, "transaction finished");
        self.inner.notifier.dismiss_pending(tx_hash);
        match notification {
            Some(notification) => self.inner.notifier.notify(notification),
            None => tracing::debug!(tx_hash = %tx_hash, "mounted subscriber owns the notification"),
        }
        self.schedule_removal(tx_hash.clone(), watch_id);
        Applied::Finished
    }

    fn schedule_removal(&self, tx_hash: TxHash, watch_id: u64) {
        let registry = self.clone();
        let shutdown = self.inner.shutdown.clone();
        let delay = self.inner.config.removal_delay();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => registry.remove_finished(&tx_hash, watch_id),
            }
        });
    }

    fn remove_finished(&self, tx_hash: &TxHash, watch_id: u64) {
        let unclaimed = {
            let mut entries = self.entries();
            if !entries.get(tx_hash).is_some_and(|e| e.watch_id == watch_id) {
                return;
            }
            entries
                .remove(tx_hash)
                .and_then(|mut entry| entry.take_deferred(tx_hash))
        };
        tracing::debug!(tx_hash = %tx_hash, "removed finished watch");
        if let Some(notification) = unclaimed {
            self.inner.notifier.notify(notification);
        }
        self.announce_removed(tx_hash.clone());
    }

    fn announce_removed(&self, tx_hash: TxHash) {
        let _ = self.inner.updates.send(TxUpdate::Removed { tx_hash });
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<TxHash, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TxRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxRegistry")
            .field("source", &self.inner.source.url())
            .field("watched", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::notify::TracingNotifier;
    use crate::transport::ByteStream;
    use async_trait::async_trait;
    use futures::StreamExt;

    /// Source whose streams never yield and whose polls always fail.
    struct SilentSource;

    #[async_trait]
    impl StatusSource for SilentSource {
        async fn open_stream(
            &self,
            _tx_hash: &TxHash,
            _auth_token: Option<&str>,
        ) -> Result<ByteStream, WatchError> {
            Ok(futures::stream::pending().boxed())
        }

        async fn fetch_status(
            &self,
            _tx_hash: &TxHash,
            _auth_token: Option<&str>,
        ) -> Result<TxStatus, WatchError> {
            Err(WatchError::Http("unreachable".into()))
        }

        fn url(&self) -> &str {
            "silent"
        }
    }

    fn registry() -> TxRegistry {
        TxRegistry::new(
            Arc::new(SilentSource),
            Arc::new(TracingNotifier),
            WatcherConfig::default(),
        )
    }

    fn template() -> NotificationTemplate {
        NotificationTemplate {
            success_title: "Course published".into(),
            success_description: "The course is live.".into(),
            error_title: "Publishing failed".into(),
            error_description: None,
        }
    }

    #[tokio::test]
    async fn register_creates_fresh_entry() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("course_create"), template());

        let snapshot = registry.get_watched_tx(&hash).unwrap();
        assert_eq!(snapshot.subscriber_count, 0);
        assert!(snapshot.status.is_none());
        assert!(!snapshot.is_terminal);
        assert!(snapshot.is_connected);
        assert_eq!(snapshot.tx_type, TxType::new("course_create"));
    }

    #[tokio::test]
    async fn register_twice_keeps_subscribers() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        registry.increment_subscriber(&hash);
        registry.register(hash.clone(), TxType::new("task_submit"), template());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_watched_tx(&hash).unwrap().subscriber_count, 1);
    }

    #[tokio::test]
    async fn subscriber_count_floors_at_zero() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());

        registry.decrement_subscriber(&hash);
        registry.increment_subscriber(&hash);
        registry.decrement_subscriber(&hash);
        registry.decrement_subscriber(&hash);
        assert_eq!(registry.get_watched_tx(&hash).unwrap().subscriber_count, 0);
    }

    #[tokio::test]
    async fn untracked_hash_is_a_no_op() {
        let registry = registry();
        let hash = TxHash::new("missing");
        registry.increment_subscriber(&hash);
        registry.decrement_subscriber(&hash);
        registry.unregister(&hash);
        assert!(registry.get_watched_tx(&hash).is_none());
        assert!(registry.observe(&hash).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unregister_removes_entry() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        registry.unregister(&hash);
        assert!(registry.get_watched_tx(&hash).is_none());
    }

    #[tokio::test]
    async fn stale_generation_is_ignored() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        let old_id = registry.entries().get(&hash).unwrap().watch_id;
        registry.unregister(&hash);
        registry.register(hash.clone(), TxType::new("task_submit"), template());

        let applied = registry.apply_status(&hash, old_id, TxStatus::with_state(TxState::Updated));
        assert_eq!(applied, Applied::Finished);
        assert!(!registry.get_watched_tx(&hash).unwrap().is_terminal);
    }

    #[tokio::test]
    async fn backward_transition_is_ignored() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        let id = registry.entries().get(&hash).unwrap().watch_id;

        registry.apply_event(&hash, id, TxEvent::StateChange { new_state: TxState::Confirmed });
        let applied = registry.apply_status(&hash, id, TxStatus::with_state(TxState::Pending));
        assert_eq!(applied, Applied::Continue);

        let status = registry.get_watched_tx(&hash).unwrap().status.unwrap();
        assert_eq!(status.state, TxState::Confirmed);
        assert_eq!(status.tx_type, Some(TxType::new("task_submit")));
    }

    #[tokio::test]
    async fn terminal_entry_accepts_no_more_updates() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        let id = registry.entries().get(&hash).unwrap().watch_id;

        assert_eq!(
            registry.apply_status(&hash, id, TxStatus::with_state(TxState::Expired)),
            Applied::Finished
        );
        registry.apply_status(&hash, id, TxStatus::with_state(TxState::Updated));

        let snapshot = registry.get_watched_tx(&hash).unwrap();
        assert!(snapshot.is_terminal);
        assert!(!snapshot.is_connected);
        assert_eq!(snapshot.status.unwrap().state, TxState::Expired);
    }

    #[tokio::test]
    async fn complete_always_finalizes() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        let id = registry.entries().get(&hash).unwrap().watch_id;

        let applied = registry.apply_event(
            &hash,
            id,
            TxEvent::Complete(CompletePayload {
                final_state: TxState::Confirmed,
                tx_type: None,
                confirmed_at: Some("2024-05-01T12:00:00Z".into()),
                last_error: None,
            }),
        );
        assert_eq!(applied, Applied::Finished);
        let snapshot = registry.get_watched_tx(&hash).unwrap();
        assert!(snapshot.is_terminal);
        assert_eq!(snapshot.status.unwrap().confirmed_at.as_deref(), Some("2024-05-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn bridge_subscriber_suppresses_registry_notification() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        let id = registry.entries().get(&hash).unwrap().watch_id;
        registry.increment_subscriber(&hash);
        assert!(registry.attach_observer(&hash));

        registry.apply_status(&hash, id, TxStatus::with_state(TxState::Failed));
        assert_eq!(registry.entries().get(&hash).unwrap().duty, NotificationDuty::Suppressed);
        assert!(registry.claim_notification(&hash).is_none());

        registry.detach_observer(&hash);
        registry.decrement_subscriber(&hash);
        assert_eq!(registry.entries().get(&hash).unwrap().duty, NotificationDuty::Suppressed);
    }

    #[tokio::test]
    async fn release_watch_keeps_entry() {
        let registry = registry();
        let hash = TxHash::new("abc123");
        registry.register(hash.clone(), TxType::new("task_submit"), template());
        let id = registry.entries().get(&hash).unwrap().watch_id;

        registry.release_watch(&hash, id + 1);
        assert!(registry.get_watched_tx(&hash).unwrap().is_connected);
        registry.release_watch(&hash, id);
        let snapshot = registry.get_watched_tx(&hash).unwrap();
        assert!(!snapshot.is_connected);
        assert!(!snapshot.is_terminal);
    }

    #[tokio::test]
    async fn auth_token_round_trip() {
        let registry = registry();
        assert_eq!(registry.auth_token(), None);
        registry.update_auth_token(Some("jwt".into()));
        assert_eq!(registry.auth_token().as_deref(), Some("jwt"));
        registry.update_auth_token(None);
        assert_eq!(registry.auth_token(), None);
    }

    #[tokio::test]
    async fn clear_all_empties_registry() {
        let registry = registry();
        registry.register(TxHash::new("a"), TxType::new("task_submit"), template());
        registry.register(TxHash::new("b"), TxType::new("task_submit"), template());
        assert_eq!(registry.len(), 2);
        registry.clear_all();
        assert!(registry.is_empty());
    }
}
