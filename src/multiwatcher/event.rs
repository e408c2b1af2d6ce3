use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::StoreStats;
use crate::Delta;
use crate::WatcherError;

pub(crate) type WatcherId = u64;

/// State a watcher handle shares with the aggregator.
#[derive(Debug)]
pub(crate) struct WatcherShared {
    pub(crate) id: WatcherId,
    /// Written by the aggregator only, once it has processed the stop
    /// request, so a request racing the stop is still refused.
    stopped: AtomicBool,
}

impl WatcherShared {
    pub(crate) fn new(id: WatcherId) -> Self {
        Self {
            id,
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns true if this call performed the transition.
    pub(crate) fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }
}

/// Deltas handed to one watcher together with the revision it advanced to.
#[derive(Debug)]
pub(crate) struct Batch {
    pub(crate) deltas: Vec<Delta>,
    pub(crate) revno: u64,
}

pub(crate) type NextReply = oneshot::Sender<Result<Batch, WatcherError>>;

#[derive(Debug)]
pub(crate) enum Request {
    /// Wants every delta after the watcher's current revision
    Next {
        watcher: Arc<WatcherShared>,
        reply: NextReply,
    },

    /// Releases the watcher's references and refuses its pending requests.
    /// `reply` is `None` when sent from a dropped handle.
    Stop {
        watcher: Arc<WatcherShared>,
        reply: Option<oneshot::Sender<()>>,
    },

    Stats(oneshot::Sender<StoreStats>),
}
