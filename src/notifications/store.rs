//! Client-side notification cache kept in sync with the server
//!
//! The server list is authoritative and replaces the cache wholesale. Local
//! mutations apply optimistically and roll back when the server refuses them.
//! Every request and mutation takes a sequence number; a list response is
//! applied only if nothing newer has been applied since it was requested.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::types::Notification;
use crate::api::NotificationApi;
use crate::error::{Result, SessionError};
use crate::presenter::SharedPresenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { total: usize, unread: usize },
    /// A newer response or local change already superseded this one
    Stale,
}

#[derive(Default)]
struct StoreInner {
    items: BTreeMap<i64, Notification>,
    /// Last sequence number handed out
    next_seq: u64,
    /// Newest sequence reflected in `items`
    applied_seq: u64,
    /// Sequence of the last server list applied
    snapshot_seq: u64,
}

impl StoreInner {
    fn next(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Sequence for a local change, which supersedes lists still in flight
    fn claim(&mut self) -> u64 {
        let seq = self.next();
        self.applied_seq = seq;
        seq
    }

    /// Roll back only if no server list arrived after the change
    fn can_roll_back(&self, seq: u64) -> bool {
        self.snapshot_seq < seq
    }

    /// A list applied after the change may have been read before the server
    /// committed it, so the change has to be applied again
    fn overwritten_since(&self, seq: u64) -> bool {
        self.snapshot_seq > seq
    }

    fn unread(&self) -> usize {
        self.items.values().filter(|n| !n.read).count()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct NotificationStore {
    api: Arc<dyn NotificationApi>,
    presenter: SharedPresenter,
    inner: Mutex<StoreInner>,
    refreshing: AtomicUsize,
    unread_tx: watch::Sender<usize>,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn NotificationApi>, presenter: SharedPresenter) -> Self {
        let (unread_tx, _) = watch::channel(0);
        Self {
            api,
            presenter,
            inner: Mutex::new(StoreInner::default()),
            refreshing: AtomicUsize::new(0),
            unread_tx,
        }
    }

    fn publish(&self, unread: usize) {
        let changed = self.unread_tx.send_if_modified(|current| {
            if *current == unread {
                false
            } else {
                *current = unread;
                true
            }
        });
        if changed {
            self.presenter.unread_count(unread);
        }
    }

    fn fail<T>(&self, context: &str, err: SessionError) -> Result<T> {
        warn!("{}: {}", context, err);
        self.presenter.error(&err.user_message());
        Err(err)
    }

    /// Replace the cache with the server's current list
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        match self.fetch().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => self.fail("Failed to refresh notifications", e),
        }
    }

    async fn fetch(&self) -> Result<RefreshOutcome> {
        let seq = self.inner.lock().next();
        let _in_flight = InFlight::enter(&self.refreshing);

        let items = self.api.list().await?;

        let outcome = {
            let mut inner = self.inner.lock();
            if seq <= inner.applied_seq {
                debug!(
                    "Discarding stale notification list (request {}, applied {})",
                    seq, inner.applied_seq
                );
                return Ok(RefreshOutcome::Stale);
            }
            inner.items = items.into_iter().map(|n| (n.id, n)).collect();
            inner.applied_seq = seq;
            inner.snapshot_seq = seq;
            RefreshOutcome::Applied {
                total: inner.items.len(),
                unread: inner.unread(),
            }
        };

        if let RefreshOutcome::Applied { total, unread } = outcome {
            debug!("Loaded {} notifications ({} unread)", total, unread);
            self.publish(unread);
        }
        Ok(outcome)
    }

    pub async fn mark_read(&self, id: i64) -> Result<()> {
        let (seq, previous, unread) = {
            let mut inner = self.inner.lock();
            let seq = inner.claim();
            let previous = inner
                .items
                .get_mut(&id)
                .map(|n| std::mem::replace(&mut n.read, true));
            (seq, previous, inner.unread())
        };
        self.publish(unread);

        if let Err(e) = self.api.mark_read(id).await {
            let unread = {
                let mut inner = self.inner.lock();
                if inner.can_roll_back(seq) {
                    if let (Some(previous), Some(n)) = (previous, inner.items.get_mut(&id)) {
                        n.read = previous;
                    }
                }
                inner.unread()
            };
            self.publish(unread);
            return self.fail("Failed to mark notification read", e);
        }

        let unread = {
            let mut inner = self.inner.lock();
            if inner.overwritten_since(seq) {
                if let Some(n) = inner.items.get_mut(&id) {
                    n.read = true;
                }
            }
            inner.unread()
        };
        self.publish(unread);
        debug!("Notification {} marked read", id);
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        let (seq, was_unread) = {
            let mut inner = self.inner.lock();
            let seq = inner.claim();
            let was_unread: Vec<i64> = inner
                .items
                .values_mut()
                .filter(|n| !n.read)
                .map(|n| {
                    n.read = true;
                    n.id
                })
                .collect();
            (seq, was_unread)
        };
        self.publish(0);

        if let Err(e) = self.api.mark_all_read().await {
            let unread = {
                let mut inner = self.inner.lock();
                if inner.can_roll_back(seq) {
                    for id in &was_unread {
                        if let Some(n) = inner.items.get_mut(id) {
                            n.read = false;
                        }
                    }
                }
                inner.unread()
            };
            self.publish(unread);
            return self.fail("Failed to mark all notifications read", e);
        }

        let unread = {
            let mut inner = self.inner.lock();
            if inner.overwritten_since(seq) {
                inner.items.values_mut().for_each(|n| n.read = true);
            }
            inner.unread()
        };
        self.publish(unread);
        debug!("Marked {} notifications read", was_unread.len());
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        let (seq, removed) = {
            let mut inner = self.inner.lock();
            let seq = inner.claim();
            (seq, std::mem::take(&mut inner.items))
        };
        self.publish(0);

        if let Err(e) = self.api.clear().await {
            let unread = {
                let mut inner = self.inner.lock();
                if inner.can_roll_back(seq) {
                    for (id, n) in removed {
                        inner.items.entry(id).or_insert(n);
                    }
                }
                inner.unread()
            };
            self.publish(unread);
            return self.fail("Failed to clear notifications", e);
        }

        let unread = {
            let mut inner = self.inner.lock();
            if inner.overwritten_since(seq) {
                for id in removed.keys() {
                    inner.items.remove(id);
                }
            }
            inner.unread()
        };
        self.publish(unread);
        info!("Cleared {} notifications", removed.len());
        Ok(())
    }

    /// Create a notification on the server and add it to the cache
    pub async fn create(&self, message: &str, task_id: Option<i64>) -> Result<Notification> {
        if message.trim().is_empty() {
            let err = SessionError::validation("Notification message must not be empty");
            self.presenter.error(&err.user_message());
            return Err(err);
        }

        let created = match self.api.create(message, task_id).await {
            Ok(created) => created,
            Err(e) => return self.fail("Failed to create notification", e),
        };

        let unread = {
            let mut inner = self.inner.lock();
            inner.claim();
            inner.items.insert(created.id, created.clone());
            inner.unread()
        };
        self.publish(unread);
        debug!("Created notification {}", created.id);
        Ok(created)
    }

    /// Cached notifications, newest first
    pub fn notifications(&self) -> Vec<Notification> {
        let mut items: Vec<Notification> = self.inner.lock().items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    pub fn get(&self, id: i64) -> Option<Notification> {
        self.inner.lock().items.get(&id).cloned()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.lock().unread()
    }

    pub fn subscribe_unread(&self) -> watch::Receiver<usize> {
        self.unread_tx.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst) > 0
    }

    /// Refresh on a fixed interval until the handle is stopped or dropped.
    /// A tick is skipped while another refresh is in flight, and a refresh
    /// that outlasts the interval pushes the next tick a full interval out.
    pub fn spawn_poll_loop(self: &Arc<Self>, interval: Duration) -> PollHandle {
        let store = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if store.is_refreshing() {
                            debug!("Refresh still in flight, skipping poll tick");
                            continue;
                        }
                        let started = Instant::now();
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            result = store.fetch() => {
                                if let Err(e) = result {
                                    warn!("Notification poll failed: {}", e);
                                }
                            }
                        }
                        if started.elapsed() >= interval {
                            debug!("Refresh outlasted the poll interval, skipping next tick");
                            ticker.reset();
                        }
                    }
                }
            }
            debug!("Notification polling stopped");
        });

        info!("Polling notifications every {}s", interval.as_secs());
        PollHandle {
            shutdown: shutdown_tx,
            handle: Some(handle),
        }
    }
}

/// Stops the poll loop; dropping the handle aborts it
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub type SharedNotificationStore = Arc<NotificationStore>;

pub fn create_shared_notification_store(
    api: Arc<dyn NotificationApi>,
    presenter: SharedPresenter,
) -> SharedNotificationStore {
    Arc::new(NotificationStore::new(api, presenter))
}
