//! Viewport persistence: sinks, stores and the debounced writer.
//!
//! The interaction engine only defines the persisted shape ([`ViewportState`]);
//! where it ends up is decided by the [`ViewportStore`] the host plugs in.

use crate::viewport::ViewportState;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default quiet period before a viewport change is written.
pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("No persisted viewport at {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Receives every viewport change.
pub trait ViewportSink {
    fn push(&mut self, state: &ViewportState);
}

/// Discards every change.
impl ViewportSink for () {
    fn push(&mut self, _state: &ViewportState) {}
}

/// Durable storage for the viewport state.
pub trait ViewportStore {
    fn save(&mut self, state: &ViewportState) -> PersistResult<()>;

    fn load(&self) -> PersistResult<ViewportState>;
}

/// In-memory store for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Option<ViewportState>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ViewportStore for MemoryStore {
    fn save(&mut self, state: &ViewportState) -> PersistResult<()> {
        self.saved = Some(*state);
        self.writes += 1;
        Ok(())
    }

    fn load(&self) -> PersistResult<ViewportState> {
        self.saved.ok_or_else(|| PersistError::NotFound("memory".to_string()))
    }
}

/// Stores the viewport as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ViewportStore for JsonFileStore {
    fn save(&mut self, state: &ViewportState) -> PersistResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&self) -> PersistResult<ViewportState> {
        if !self.path.exists() {
            return Err(PersistError::NotFound(self.path.display().to_string()));
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Debounce settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistConfig {
    /// Quiet period in milliseconds.
    pub debounce_ms: u64,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self { debounce_ms: DEFAULT_DEBOUNCE_MS }
    }
}

impl PersistConfig {
    pub fn with_debounce_ms(debounce_ms: u64) -> Self {
        Self { debounce_ms }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Coalesces bursts of viewport changes into a single store write.
///
/// Every push restarts the quiet period; the host calls [`DebouncedSink::poll`]
/// once per frame to write the latest state once the period elapsed. Dropping
/// the sink cancels a pending write.
#[derive(Debug)]
pub struct DebouncedSink<S: ViewportStore> {
    store: S,
    interval: Duration,
    pending: Option<ViewportState>,
    deadline: Option<Instant>,
}

impl<S: ViewportStore> DebouncedSink<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, PersistConfig::default())
    }

    pub fn with_config(store: S, config: PersistConfig) -> Self {
        Self {
            store,
            interval: config.interval(),
            pending: None,
            deadline: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a write is scheduled.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a change at an explicit time.
    pub fn push_at(&mut self, state: &ViewportState, now: Instant) {
        self.pending = Some(*state);
        self.deadline = Some(now + self.interval);
    }

    /// Write the pending state if the quiet period has elapsed.
    /// Returns true if a write was attempted.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.flush();
                true
            }
            _ => false,
        }
    }

    /// Write the pending state immediately.
    pub fn flush(&mut self) {
        self.deadline = None;
        let Some(state) = self.pending.take() else {
            return;
        };
        match self.store.save(&state) {
            Ok(()) => log::debug!("Persisted viewport scale={} position={:?}", state.scale, state.position),
            Err(e) => log::warn!("Failed to persist viewport: {}", e),
        }
    }

    /// Drop the pending write, if any.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            log::debug!("Cancelled pending viewport write");
        }
        self.deadline = None;
    }

    /// Load the last persisted state from the store.
    pub fn load(&self) -> PersistResult<ViewportState> {
        self.store.load()
    }
}

impl<S: ViewportStore> ViewportSink for DebouncedSink<S> {
    fn push(&mut self, state: &ViewportState) {
        self.push_at(state, Instant::now());
    }
}

impl<S: ViewportStore> Drop for DebouncedSink<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}
