//! In-memory audio clips keyed by opaque ids, with time-based eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default retention for a stored clip.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5 * 60);
/// Default period of the eviction sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default cap on stored clips.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// One synthesized clip.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    pub audio_id: String,
    pub bytes: Vec<u8>,
    pub created_at: Instant,
}

struct StoreInner {
    entries: RwLock<HashMap<String, AudioBlob>>,
    retention: Duration,
    max_entries: usize,
}

impl StoreInner {
    fn evict_expired(&self) -> usize {
        let retention = self.retention;
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, blob| blob.created_at.elapsed() < retention);
        before - entries.len()
    }
}

/// Audio reference store.
///
/// Built once by the composition root and shared as `Arc<AudioStore>`.
/// Clips are consumed by [`take`](Self::take) and otherwise dropped once
/// older than the retention window.
pub struct AudioStore {
    inner: Arc<StoreInner>,
    sequence: AtomicU64,
    sweep_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Default for AudioStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL)
    }
}

impl std::fmt::Debug for AudioStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStore")
            .field("entries", &self.len())
            .field("retention", &self.inner.retention)
            .field("sweep_interval", &self.sweep_interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl AudioStore {
    pub fn new(retention: Duration, sweep_interval: Duration) -> Self {
        Self::with_limits(retention, sweep_interval, DEFAULT_MAX_ENTRIES)
    }

    /// Like [`new`](Self::new), with a cap on stored clips. When full, the
    /// oldest clip makes room for a new one.
    pub fn with_limits(retention: Duration, sweep_interval: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: RwLock::new(HashMap::new()),
                retention,
                max_entries: max_entries.max(1),
            }),
            sequence: AtomicU64::new(0),
            sweep_interval,
            sweeper: Mutex::new(None),
        }
    }

    /// New clip id: `audio_<unix millis>_<store sequence>_<chunk>`.
    ///
    /// The sequence is shared by every request using this store, so ids never
    /// repeat for the store's lifetime.
    pub fn allocate_id(&self, chunk_id: u32) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        format!("audio_{millis}_{seq}_{chunk_id}")
    }

    /// Store a clip under `audio_id`.
    pub fn put(&self, audio_id: impl Into<String>, bytes: Vec<u8>) {
        let audio_id = audio_id.into();
        let Ok(mut entries) = self.inner.entries.write() else {
            return;
        };

        if entries.len() >= self.inner.max_entries && !entries.contains_key(&audio_id) {
            if let Some(oldest) = entries
                .values()
                .min_by_key(|blob| blob.created_at)
                .map(|blob| blob.audio_id.clone())
            {
                debug!(audio_id = %oldest, "Store full, dropping oldest clip");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            audio_id.clone(),
            AudioBlob {
                audio_id,
                bytes,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return a clip. `None` if unknown, already taken, or expired.
    pub fn take(&self, audio_id: &str) -> Option<Vec<u8>> {
        let blob = self.inner.entries.write().ok()?.remove(audio_id)?;
        if blob.created_at.elapsed() >= self.inner.retention {
            return None;
        }
        Some(blob.bytes)
    }

    /// Drop every clip older than the retention window. Returns how many went.
    pub fn evict(&self) -> usize {
        self.inner.evict_expired()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic eviction sweep. Calling it again while running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let Ok(mut sweeper) = self.sweeper.lock() else {
            return;
        };
        if sweeper.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let period = self.sweep_interval;
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = inner.evict_expired();
                if evicted > 0 {
                    debug!(evicted, "Evicted expired audio clips");
                }
            }
        }));
        info!(interval_secs = period.as_secs(), "Audio eviction sweep started");
    }

    /// Stop the eviction sweep if it is running.
    pub fn stop(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(task) = sweeper.take() {
                task.abort();
                info!("Audio eviction sweep stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .map(|s| s.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for AudioStore {
    fn drop(&mut self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(task) = sweeper.take() {
                task.abort();
            }
        }
    }
}
