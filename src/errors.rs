//! Multiwatcher Error Hierarchy
//!
//! Errors are split by the layer that raises them: configuration loading,
//! the backing store the aggregator reads from, and the watcher-facing
//! request path.

use std::sync::Arc;

use config::ConfigError;

use crate::EntityId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failures reported by the backing store
    #[error(transparent)]
    Backing(#[from] BackingError),

    /// Failures observed by a watcher handle
    #[error(transparent)]
    Watcher(#[from] WatcherError),

    /// Unrecoverable failures requiring the aggregator to terminate
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BackingError {
    /// The entity no longer exists in the backing store.
    ///
    /// The aggregator treats this as a removal, never as a failure.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// The backing store could not be reached
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    /// Any other backing failure with source context
    #[error("backing failure while {context}")]
    Internal {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BackingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackingError::NotFound(_))
    }
}

/// Errors returned from [`crate::Watcher::next`] and [`crate::Watcher::stop`].
///
/// Cloneable so that one terminal error can be handed to every waiting watcher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatcherError {
    /// The watcher itself was stopped
    #[error("watcher was stopped")]
    Stopped,

    /// The aggregator shut down without error
    #[error("shared state watcher was stopped")]
    StoreStopped,

    /// The aggregator terminated on a backing failure
    #[error("shared state watcher died")]
    Fatal(#[source] Arc<BackingError>),

    /// A newer request pushed this one out of the watcher backlog
    #[error("request superseded by a newer request from the same watcher")]
    Superseded,
}

impl WatcherError {
    /// True for the stable stop errors, false when the aggregator died on a
    /// backing failure or the request was superseded.
    pub fn is_stopped(&self) -> bool {
        matches!(self, WatcherError::Stopped | WatcherError::StoreStopped)
    }
}
