//! JSON Data Document
//!
//! One JSON file mirrored in memory. Mutations happen in memory only; a
//! background autosave task compares the value against the snapshot taken at
//! the last write and rewrites the file when they differ.
//!
//! Writes go through a temp file and a rename, and a per-document flush lock
//! keeps at most one write in flight. A `set` that lands while a write is in
//! progress is picked up by the next tick.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default autosave interval
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Values that can live in a [`JsonDocument`]
pub trait DocumentValue: Serialize + DeserializeOwned + Clone + PartialEq + Send + 'static {}

impl<T> DocumentValue for T where T: Serialize + DeserializeOwned + Clone + PartialEq + Send + 'static {}

struct DocumentState<T> {
    value: T,
    /// Copy of what is on disk, `None` until the first write or load
    last_flushed: Option<T>,
}

struct Shared<T> {
    path: PathBuf,
    state: Mutex<DocumentState<T>>,
    flush_lock: Mutex<()>,
    writes: AtomicU64,
}

impl<T: DocumentValue> Shared<T> {
    /// Write the current value; unless `force`, only when it changed
    fn flush(&self, force: bool) -> Result<bool, StoreError> {
        let _flushing = self.flush_lock.lock();

        let snapshot = {
            let state = self.state.lock();
            if !force && state.last_flushed.as_ref() == Some(&state.value) {
                return Ok(false);
            }
            state.value.clone()
        };

        let data = serde_json::to_string_pretty(&snapshot)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, &self.path)?;

        self.writes.fetch_add(1, Ordering::Relaxed);
        self.state.lock().last_flushed = Some(snapshot);
        debug!("Wrote {}", self.path.display());
        Ok(true)
    }

    /// Replace a missing or unreadable file with the in-memory default
    fn recreate(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&self.path)?;
        self.flush(true)?;
        Ok(())
    }
}

/// Write-back cache of one JSON file
pub struct JsonDocument<T> {
    shared: Arc<Shared<T>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T: DocumentValue> JsonDocument<T> {
    /// Load `path`, materializing `default` if the file is missing or corrupt
    pub fn open(path: impl Into<PathBuf>, default: T) -> Result<Self, StoreError> {
        let path = path.into();

        let (value, loaded) = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => (value, true),
                Err(e) => {
                    warn!("Error decoding {} ({}), resetting file", path.display(), e);
                    (default, false)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("File {} doesn't exist, creating", path.display());
                (default, false)
            }
            Err(e) => return Err(e.into()),
        };

        let last_flushed = loaded.then(|| value.clone());
        let (shutdown, _) = watch::channel(false);
        let document = Self {
            shared: Arc::new(Shared {
                path,
                state: Mutex::new(DocumentState { value, last_flushed }),
                flush_lock: Mutex::new(()),
                writes: AtomicU64::new(0),
            }),
            shutdown,
            task: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        if !loaded {
            document.shared.recreate()?;
        }

        info!("{} loaded", document.path().display());
        Ok(document)
    }

    /// [`open`](Self::open) and start autosaving every `period`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open_with_autosave(path: impl Into<PathBuf>, default: T, period: Duration) -> Result<Self, StoreError> {
        let document = Self::open(path, default)?;
        document.start_autosave(period);
        Ok(document)
    }

    /// Spawn the autosave task, replacing any running one
    pub fn start_autosave(&self, period: Duration) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("Not autosaving closed document {}", self.path().display());
            return;
        }

        let shared = Arc::clone(&self.shared);
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = shared.flush(false) {
                            warn!("Autosave of {} failed: {}", shared.path.display(), e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Autosave of {} stopped", shared.path.display());
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.shared.state.lock().value.clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.state.lock().value)
    }

    /// Mutate the value in place; the change is written on the next tick
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.warn_if_closed();
        f(&mut self.shared.state.lock().value)
    }

    /// Replace the whole value
    pub fn set(&self, value: T) {
        self.warn_if_closed();
        self.shared.state.lock().value = value;
    }

    fn warn_if_closed(&self) {
        if self.is_closed() {
            warn!("{} is closed, change will not be written", self.path().display());
        }
    }

    /// Whether memory differs from the last written snapshot
    pub fn is_dirty(&self) -> bool {
        let state = self.shared.state.lock();
        state.last_flushed.as_ref() != Some(&state.value)
    }

    /// Number of writes since open
    pub fn write_count(&self) -> u64 {
        self.shared.writes.load(Ordering::Relaxed)
    }

    /// Write now if the value changed; returns whether a write happened
    pub fn flush_if_dirty(&self) -> Result<bool, StoreError> {
        self.shared.flush(false)
    }

    /// Write now regardless of changes
    pub fn flush(&self) -> Result<(), StoreError> {
        self.shared.flush(true).map(|_| ())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop autosaving and write one final time
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Autosave task of {} ended abnormally: {}", self.path().display(), e);
            }
        }

        self.shared.flush(true)?;
        info!("{} closed", self.path().display());
        Ok(())
    }
}
