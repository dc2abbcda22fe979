//! Background catalog loading with cancellation and a fallback directory.
//!
//! The load runs on a named worker thread. A shared flag lets the caller
//! cancel it between files. When the primary directory fails to load, the
//! fallback (typically the default preset) is tried before giving up. A
//! cancelled or failed load yields an error and never a partial catalog.

use foreman_core::catalog::Catalog;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::catalog::load_catalog_cancellable;
use crate::format::DataLoadError;

// ===========================================================================
// Outcome and errors
// ===========================================================================

/// Which directory the catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub catalog: Arc<Catalog>,
    pub source: LoadSource,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("catalog load cancelled")]
    Cancelled,

    #[error("catalog load failed: {primary}")]
    Failed { primary: DataLoadError },

    #[error("catalog load failed: {primary}; fallback also failed: {fallback}")]
    FallbackFailed {
        primary: DataLoadError,
        fallback: DataLoadError,
    },

    #[error("failed to start catalog loader thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("catalog loader thread panicked")]
    WorkerPanicked,
}

// ===========================================================================
// Loader
// ===========================================================================

/// Describes one catalog load: a primary directory and an optional fallback.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    primary: PathBuf,
    fallback: Option<PathBuf>,
}

impl CatalogLoader {
    pub fn new(primary: impl Into<PathBuf>, fallback: Option<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback,
        }
    }

    /// Start loading on a worker thread.
    pub fn spawn(primary: impl Into<PathBuf>, fallback: Option<PathBuf>) -> LoadHandle {
        Self::new(primary, fallback).start()
    }

    /// Start this load on a worker thread.
    pub fn start(self) -> LoadHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let worker = thread::Builder::new()
            .name("foreman-catalog-load".to_string())
            .spawn(move || self.run(&flag));

        match worker {
            Ok(worker) => LoadHandle {
                cancel,
                state: HandleState::Running(worker),
            },
            Err(e) => LoadHandle {
                cancel,
                state: HandleState::SpawnFailed(e),
            },
        }
    }

    /// Run the load on the current thread.
    pub fn run(&self, cancel: &AtomicBool) -> Result<LoadOutcome, LoadError> {
        let primary = match load_catalog_cancellable(&self.primary, cancel) {
            Ok(catalog) => return finish(catalog, LoadSource::Primary, cancel),
            Err(DataLoadError::Cancelled) => return Err(LoadError::Cancelled),
            Err(e) => e,
        };

        let Some(fallback_dir) = &self.fallback else {
            return Err(LoadError::Failed { primary });
        };
        warn!(
            primary = %self.primary.display(),
            fallback = %fallback_dir.display(),
            error = %primary,
            "catalog load failed, using fallback"
        );

        match load_catalog_cancellable(fallback_dir, cancel) {
            Ok(catalog) => finish(catalog, LoadSource::Fallback, cancel),
            Err(DataLoadError::Cancelled) => Err(LoadError::Cancelled),
            Err(fallback) => Err(LoadError::FallbackFailed { primary, fallback }),
        }
    }
}

fn finish(catalog: Catalog, source: LoadSource, cancel: &AtomicBool) -> Result<LoadOutcome, LoadError> {
    // A cancel that arrives after the last file still wins.
    if cancel.load(Ordering::Relaxed) {
        return Err(LoadError::Cancelled);
    }
    info!(?source, "catalog ready");
    Ok(LoadOutcome {
        catalog: Arc::new(catalog),
        source,
    })
}

// ===========================================================================
// Handle
// ===========================================================================

#[derive(Debug)]
enum HandleState {
    Running(JoinHandle<Result<LoadOutcome, LoadError>>),
    SpawnFailed(std::io::Error),
}

/// Handle to an in-flight catalog load.
///
/// Dropping the handle cancels the load and detaches the worker.
#[derive(Debug)]
pub struct LoadHandle {
    cancel: Arc<AtomicBool>,
    state: HandleState,
}

impl LoadHandle {
    /// Request cancellation. The worker stops before its next file.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Running(worker) => worker.is_finished(),
            HandleState::SpawnFailed(_) => true,
        }
    }

    /// Block until the load completes. Once [`cancel`](Self::cancel) has been
    /// called this always returns [`LoadError::Cancelled`].
    pub fn wait(mut self) -> Result<LoadOutcome, LoadError> {
        let state = std::mem::replace(
            &mut self.state,
            HandleState::SpawnFailed(std::io::Error::other("handle consumed")),
        );
        let result = match state {
            HandleState::Running(worker) => worker.join().map_err(|_| LoadError::WorkerPanicked)?,
            HandleState::SpawnFailed(e) => Err(LoadError::Spawn(e)),
        };
        if self.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        result
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        if let HandleState::Running(worker) = &self.state {
            if !worker.is_finished() {
                self.cancel();
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
