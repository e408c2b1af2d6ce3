use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use super::Aggregator;
use super::Request;
use super::Watcher;
use super::WatcherShared;
use crate::metrics::register_custom_metrics;
use crate::Backing;
use crate::Error;
use crate::MultiwatcherConfig;
use crate::Result;
use crate::WatcherError;

/// Snapshot of the aggregator's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries held, including removed entries kept for their observers
    pub entities: usize,
    pub latest_revno: u64,
    /// Watchers that have asked for changes and are not stopped
    pub watchers: usize,
    pub pending_requests: usize,
}

/// Owns the aggregator task and hands out [`Watcher`]s.
///
/// # Example
/// ```ignore
/// let backing = Arc::new(MemBacking::new());
/// let manager = StoreManager::new(backing.clone(), MultiwatcherConfig::default())?;
///
/// let watcher = manager.watch();
/// let deltas = watcher.next().await?;
///
/// watcher.stop().await?;
/// manager.stop().await?;
/// ```
pub struct StoreManager {
    request_tx: mpsc::Sender<Request>,
    shutdown_tx: watch::Sender<()>,
    handle: Mutex<Option<JoinHandle<std::result::Result<(), WatcherError>>>>,
    exit: Arc<OnceLock<WatcherError>>,
    next_watcher_id: AtomicU64,
}

impl std::fmt::Debug for StoreManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StoreManager")
            .field("next_watcher_id", &self.next_watcher_id)
            .field("exit", &self.exit.get())
            .finish_non_exhaustive()
    }
}

impl StoreManager {
    /// Validates `config` and spawns the aggregator on the current tokio
    /// runtime. The aggregator loads a full snapshot from `backing` before it
    /// answers any watcher.
    pub fn new<B>(
        backing: Arc<B>,
        config: MultiwatcherConfig,
    ) -> Result<Self>
    where
        B: Backing,
    {
        let config = Arc::new(config.validate()?);
        if config.aggregator.enable_metrics {
            register_custom_metrics();
        }

        let (request_tx, request_rx) = mpsc::channel(config.watcher.request_queue_size);
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let exit = Arc::new(OnceLock::new());

        let aggregator = Aggregator::new(backing, config, request_rx, shutdown_rx, exit.clone());
        let handle = tokio::spawn(aggregator.run());

        Ok(Self {
            request_tx,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
            exit,
            next_watcher_id: AtomicU64::new(1),
        })
    }

    /// Creates a watcher positioned before every change: its first `next()`
    /// returns the whole current state.
    pub fn watch(&self) -> Watcher {
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        debug!(watcher_id = id, "watcher created");
        Watcher::new(
            Arc::new(WatcherShared::new(id)),
            self.request_tx.clone(),
            self.exit.clone(),
        )
    }

    pub async fn stats(&self) -> std::result::Result<StoreStats, WatcherError> {
        let (tx, rx) = oneshot::channel();
        if self.request_tx.send(Request::Stats(tx)).await.is_err() {
            return Err(exit_error(&self.exit));
        }
        rx.await.map_err(|_| exit_error(&self.exit))
    }

    pub fn is_stopped(&self) -> bool {
        self.exit.get().is_some()
    }

    /// Stops the aggregator and waits for it to exit.
    ///
    /// Returns the error that killed the aggregator, if any. Every later call
    /// returns the same outcome.
    pub async fn stop(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(());

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            match handle.await {
                Ok(result) => result?,
                Err(e) => {
                    warn!("multiwatcher aggregator task failed: {:?}", e);
                    return Err(Error::Fatal(format!("aggregator task failed: {e}")));
                }
            }
            return Ok(());
        }

        match self.exit.get() {
            Some(e @ WatcherError::Fatal(_)) => Err(e.clone().into()),
            _ => Ok(()),
        }
    }
}

/// Error reported once the aggregator is gone.
pub(crate) fn exit_error(exit: &OnceLock<WatcherError>) -> WatcherError {
    exit.get().cloned().unwrap_or(WatcherError::StoreStopped)
}
