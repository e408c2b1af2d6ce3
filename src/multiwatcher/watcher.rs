use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;
use tracing::trace;
use tracing::warn;

use super::exit_error;
use super::Batch;
use super::Request;
use super::WatcherShared;
use crate::Delta;
use crate::WatcherError;

/// A consumer's cursor over the delta stream.
///
/// Each watcher advances independently. `stop()` must be called once the
/// watcher is no longer needed so the aggregator can release the entries it
/// kept for it; dropping an unstopped watcher sends a best-effort stop.
///
/// `next()` has no timeout but is cancel safe: a call abandoned in favour of
/// a timer leaves its request with the watcher, and the following call
/// returns that request's answer.
#[derive(Debug)]
pub struct Watcher {
    shared: Arc<WatcherShared>,
    request_tx: mpsc::Sender<Request>,
    exit: Arc<OnceLock<WatcherError>>,
    revno: AtomicU64,
    /// Requests whose `next()` was dropped before the answer was read
    parked: Mutex<VecDeque<BatchReceiver>>,
}

type BatchReceiver = oneshot::Receiver<Result<Batch, WatcherError>>;

/// Hands an unread reply back to the watcher if the awaiting future is
/// dropped.
struct InFlight<'a> {
    parked: &'a Mutex<VecDeque<BatchReceiver>>,
    rx: Option<BatchReceiver>,
}

impl InFlight<'_> {
    /// `None` once the aggregator is gone without answering.
    async fn recv(&mut self) -> Option<Result<Batch, WatcherError>> {
        let rx = self.rx.as_mut()?;
        let reply = rx.await.ok();
        self.rx = None;
        reply
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(rx) = self.rx.take() {
            self.parked.lock().push_back(rx);
        }
    }
}

impl Watcher {
    pub(crate) fn new(
        shared: Arc<WatcherShared>,
        request_tx: mpsc::Sender<Request>,
        exit: Arc<OnceLock<WatcherError>>,
    ) -> Self {
        Self {
            shared,
            request_tx,
            exit,
            revno: AtomicU64::new(0),
            parked: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Revision of the last batch returned by `next()`; 0 before the first.
    pub fn revno(&self) -> u64 {
        self.revno.load(Ordering::Acquire)
    }

    /// Waits until there are changes after this watcher's revision and
    /// returns them oldest first, each entity at most once.
    pub async fn next(&self) -> Result<Vec<Delta>, WatcherError> {
        if self.shared.is_stopped() {
            return Err(WatcherError::Stopped);
        }

        let parked = self.parked.lock().pop_front();
        let rx = match parked {
            Some(rx) => rx,
            None => {
                let (reply, rx) = oneshot::channel();
                let request = Request::Next {
                    watcher: self.shared.clone(),
                    reply,
                };
                if self.request_tx.send(request).await.is_err() {
                    return Err(exit_error(&self.exit));
                }
                rx
            }
        };

        let mut in_flight = InFlight {
            parked: &self.parked,
            rx: Some(rx),
        };
        match in_flight.recv().await {
            Some(Ok(batch)) => {
                self.revno.fetch_max(batch.revno, Ordering::AcqRel);
                trace!(watcher_id = self.shared.id, revno = batch.revno, "batch received");
                Ok(batch.deltas)
            }
            Some(Err(e)) => Err(e),
            None => Err(exit_error(&self.exit)),
        }
    }

    /// Releases this watcher's references and fails its waiting `next()`
    /// calls with [`WatcherError::Stopped`]. Calling it again is a no-op.
    pub async fn stop(&self) -> Result<(), WatcherError> {
        if self.shared.is_stopped() {
            return Ok(());
        }

        let (reply, rx) = oneshot::channel();
        let request = Request::Stop {
            watcher: self.shared.clone(),
            reply: Some(reply),
        };
        if self.request_tx.send(request).await.is_err() {
            return Err(exit_error(&self.exit));
        }
        rx.await.map_err(|_| exit_error(&self.exit))
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if self.shared.is_stopped() {
            return;
        }
        let request = Request::Stop {
            watcher: self.shared.clone(),
            reply: None,
        };
        match self.request_tx.try_send(request) {
            Ok(()) => trace!(watcher_id = self.shared.id, "stop sent from dropped watcher"),
            Err(TrySendError::Full(_)) => {
                warn!(
                    watcher_id = self.shared.id,
                    "request queue full; references of dropped watcher are not released"
                );
            }
            // Aggregator gone: nothing left to release.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
