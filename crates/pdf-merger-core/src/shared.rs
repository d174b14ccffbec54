//! Process-wide, lazily initialized handles.
//!
//! Concurrent first callers share a single initialization. A failed
//! initialization leaves the handle empty, so the next caller tries again.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::PdfMerger;
use crate::config::AppConfig;
use crate::error::{Error, Result};

/// A value built once on first use and then shared
pub struct SharedHandle<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> SharedHandle<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// Return the shared value, running `init` if nothing is stored yet.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.cell
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// The stored value, if initialization already succeeded
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().map(Arc::clone)
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_MERGER: SharedHandle<PdfMerger> = SharedHandle::new();

/// The process-wide merger, configured from the default config locations.
pub async fn shared_merger() -> Result<Arc<PdfMerger>> {
    SHARED_MERGER
        .get_or_try_init(|| async {
            let config = tokio::task::spawn_blocking(AppConfig::try_load)
                .await
                .map_err(|e| Error::Worker(e.to_string()))??;
            PdfMerger::new(config)
        })
        .await
}
