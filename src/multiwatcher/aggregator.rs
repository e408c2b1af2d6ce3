//! The single task that owns the entity store.
//!
//! All mutation of the store happens here. Backing notifications, watcher
//! requests and the shutdown signal are multiplexed into one sequential
//! loop; after every event the loop answers whichever waiting requests now
//! have deltas to deliver.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::OnceLock;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Batch;
use super::NextReply;
use super::Request;
use super::StoreStats;
use super::WatcherId;
use super::WatcherShared;
use crate::metrics::BACKING_CHANGES_METRIC;
use crate::metrics::BATCHES_METRIC;
use crate::metrics::DELTAS_METRIC;
use crate::metrics::ENTITIES_METRIC;
use crate::metrics::LATEST_REVNO_METRIC;
use crate::metrics::WATCHERS_METRIC;
use crate::Backing;
use crate::Change;
use crate::ChangeReceiver;
use crate::EntityStore;
use crate::MultiwatcherConfig;
use crate::UpdateOutcome;
use crate::WatcherError;

/// Aggregator-side view of one watcher that has asked for changes.
#[derive(Debug)]
pub(crate) struct WatcherState {
    pub(crate) shared: Arc<WatcherShared>,
    /// Revision of the last batch delivered
    pub(crate) revno: u64,
    /// Unanswered `next()` calls, oldest first
    pub(crate) pending: VecDeque<NextReply>,
}

pub(crate) struct Aggregator<B>
where
    B: Backing,
{
    backing: Arc<B>,
    pub(crate) store: EntityStore,
    pub(crate) watchers: HashMap<WatcherId, WatcherState>,
    config: Arc<MultiwatcherConfig>,

    request_rx: mpsc::Receiver<Request>,
    shutdown_signal: watch::Receiver<()>,

    /// Terminal error, published before the request channel closes
    exit: Arc<OnceLock<WatcherError>>,

    // Contributions to the process-wide gauges
    reported_entities: i64,
    reported_watchers: i64,
}

impl<B> Aggregator<B>
where
    B: Backing,
{
    pub(crate) fn new(
        backing: Arc<B>,
        config: Arc<MultiwatcherConfig>,
        request_rx: mpsc::Receiver<Request>,
        shutdown_signal: watch::Receiver<()>,
        exit: Arc<OnceLock<WatcherError>>,
    ) -> Self {
        Self {
            backing,
            store: EntityStore::new(),
            watchers: HashMap::new(),
            config,
            request_rx,
            shutdown_signal,
            exit,
            reported_entities: 0,
            reported_watchers: 0,
        }
    }

    /// Runs until shutdown, until every request sender is gone, or until the
    /// backing fails. Pending requests are answered with the terminal error.
    pub(crate) async fn run(mut self) -> Result<(), WatcherError> {
        let (change_tx, mut change_rx) = mpsc::unbounded_channel();
        // Watch before the snapshot: a change racing `get_all` is applied
        // twice at worst, and both update and removal are idempotent.
        self.backing.watch(change_tx.clone());

        let result = self.serve(&mut change_rx).await;

        self.backing.unwatch(&change_tx);
        let terminal = match &result {
            Ok(()) => {
                info!("multiwatcher aggregator stopped");
                WatcherError::StoreStopped
            }
            Err(e) => {
                error!("multiwatcher aggregator died: {:?}", e);
                e.clone()
            }
        };
        self.shutdown(terminal);
        result
    }

    async fn serve(
        &mut self,
        change_rx: &mut ChangeReceiver,
    ) -> Result<(), WatcherError> {
        self.backing
            .get_all(&mut self.store)
            .map_err(|e| WatcherError::Fatal(Arc::new(e)))?;
        info!(
            entities = self.store.len(),
            revno = self.store.latest_revno(),
            "multiwatcher aggregator started"
        );
        self.publish_metrics();

        let max_consecutive_changes = self.config.aggregator.max_consecutive_changes.max(1);
        let mut consecutive_changes = 0;
        loop {
            tokio::select! {
                // Use biased to ensure branch order
                biased;
                // P0: shutdown received
                _ = self.shutdown_signal.changed() => {
                    debug!("multiwatcher shutdown signal received");
                    return Ok(());
                }
                // P1: backing changes are applied before any request queued behind them
                Some(change) = change_rx.recv() => {
                    self.changed(change)?;
                    consecutive_changes += 1;
                    if consecutive_changes >= max_consecutive_changes {
                        // Let one queued request in so a busy backing can not
                        // starve the watchers.
                        consecutive_changes = 0;
                        if let Ok(request) = self.request_rx.try_recv() {
                            self.handle(request);
                        }
                    }
                }
                // P2: watcher requests
                request = self.request_rx.recv() => match request {
                    Some(request) => {
                        consecutive_changes = 0;
                        self.handle(request);
                    }
                    None => {
                        debug!("every request sender dropped");
                        return Ok(());
                    }
                },
            }
            self.respond();
            self.publish_metrics();
        }
    }

    /// Applies one backing notification to the store.
    pub(crate) fn changed(
        &mut self,
        change: Change,
    ) -> Result<(), WatcherError> {
        trace!(id = %change.id, revno = change.revno, "backing change received");
        if self.config.aggregator.enable_metrics {
            BACKING_CHANGES_METRIC.with_label_values(&[change.id.kind.name()]).inc();
        }

        match self.backing.fetch(&change.id) {
            Ok(info) => {
                let id = self.backing.entity_id_for_info(&info);
                if let UpdateOutcome::Revived { removed_at } = self.store.update(info) {
                    // Watchers past the removal do not hold it; they pick it
                    // up again like a new entity.
                    debug!(%id, removed_at, "removed entity revived");
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.store.mark_removed(&change.id);
                Ok(())
            }
            Err(e) => Err(WatcherError::Fatal(Arc::new(e))),
        }
    }

    pub(crate) fn handle(
        &mut self,
        request: Request,
    ) {
        match request {
            Request::Next { watcher, reply } => {
                if watcher.is_stopped() {
                    let _ = reply.send(Err(WatcherError::Stopped));
                    return;
                }
                let max_pending = self.config.watcher.max_pending_requests.max(1);
                let state = self.watchers.entry(watcher.id).or_insert_with(|| {
                    debug!(watcher_id = watcher.id, "watcher registered");
                    WatcherState {
                        shared: watcher.clone(),
                        revno: 0,
                        pending: VecDeque::new(),
                    }
                });
                while state.pending.len() >= max_pending {
                    if let Some(oldest) = state.pending.pop_front() {
                        warn!(watcher_id = watcher.id, "pending request superseded");
                        let _ = oldest.send(Err(WatcherError::Superseded));
                    }
                }
                state.pending.push_back(reply);
            }

            Request::Stop { watcher, reply } => {
                if watcher.mark_stopped() {
                    self.leave(watcher.id);
                }
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }

            Request::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Refuses the pending requests of a stopped watcher and releases every
    /// reference it holds.
    fn leave(
        &mut self,
        id: WatcherId,
    ) {
        let Some(state) = self.watchers.remove(&id) else {
            // Never asked for anything: holds no references.
            debug!(watcher_id = id, "idle watcher stopped");
            return;
        };
        for reply in state.pending {
            let _ = reply.send(Err(WatcherError::Stopped));
        }
        self.store.leave(state.revno);
        debug!(watcher_id = id, revno = state.revno, "watcher stopped");
    }

    /// Answers, for every watcher, its oldest live request if the store has
    /// changed since that watcher's revision.
    pub(crate) fn respond(&mut self) {
        for state in self.watchers.values_mut() {
            while let Some(reply) = state.pending.pop_front() {
                // The watcher handle is gone; nothing is delivered to it.
                if reply.is_closed() {
                    continue;
                }
                let deltas = self.store.changes_since(state.revno);
                if deltas.is_empty() {
                    state.pending.push_front(reply);
                    break;
                }

                let since = state.revno;
                let revno = self.store.latest_revno();
                let count = deltas.len() as u64;
                if reply.send(Ok(Batch { deltas, revno })).is_err() {
                    continue;
                }
                state.revno = revno;
                self.store.seen(since);
                trace!(watcher_id = state.shared.id, since, revno, count, "batch delivered");

                if self.config.aggregator.enable_metrics {
                    BATCHES_METRIC.inc();
                    DELTAS_METRIC.inc_by(count);
                }
                break;
            }
        }
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            entities: self.store.len(),
            latest_revno: self.store.latest_revno(),
            watchers: self.watchers.len(),
            pending_requests: self.watchers.values().map(|w| w.pending.len()).sum(),
        }
    }

    fn publish_metrics(&mut self) {
        if !self.config.aggregator.enable_metrics {
            return;
        }
        let entities = self.store.len() as i64;
        let watchers = self.watchers.len() as i64;
        ENTITIES_METRIC.add(entities - self.reported_entities);
        WATCHERS_METRIC.add(watchers - self.reported_watchers);
        self.reported_entities = entities;
        self.reported_watchers = watchers;
        LATEST_REVNO_METRIC.set(self.store.latest_revno() as i64);
    }

    /// Publishes the terminal error and answers everything still waiting.
    fn shutdown(
        &mut self,
        terminal: WatcherError,
    ) {
        let _ = self.exit.set(terminal.clone());
        self.request_rx.close();

        for (_, state) in self.watchers.drain() {
            for reply in state.pending {
                let _ = reply.send(Err(terminal.clone()));
            }
        }
        while let Ok(request) = self.request_rx.try_recv() {
            match request {
                Request::Next { reply, .. } => {
                    let _ = reply.send(Err(terminal.clone()));
                }
                Request::Stop { reply, .. } => {
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                }
                Request::Stats(_) => {}
            }
        }

        if self.config.aggregator.enable_metrics {
            ENTITIES_METRIC.sub(self.reported_entities);
            WATCHERS_METRIC.sub(self.reported_watchers);
            self.reported_entities = 0;
            self.reported_watchers = 0;
        }
    }
}
