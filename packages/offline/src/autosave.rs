use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use common::{AutoSaveConfig, KeyValueEngine, StorageError};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::record_store::RecordStore;

/// Default autosave tick interval.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Live job-form state owned by the editing UI.
pub trait DraftSource: Send + Sync {
    /// Current value of the form. `Null` means there is nothing to save.
    fn current(&self) -> Result<Value, StorageError>;
}

impl<T: Serialize + Send + Sync> DraftSource for RwLock<T> {
    fn current(&self) -> Result<Value, StorageError> {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        Ok(serde_json::to_value(&*guard)?)
    }
}

/// State shared between a controller and its tick task for one binding.
struct Session<E: ?Sized> {
    job_id: String,
    source: Arc<dyn DraftSource>,
    store: Arc<RecordStore<E>>,
    /// Serialized form of the last value handed to the store. Held across the
    /// write, so ticks and manual saves never overlap.
    last_saved: Mutex<Option<String>>,
}

impl<E: KeyValueEngine + ?Sized> Session<E> {
    async fn save_if_changed(&self) -> Result<bool, StorageError> {
        let mut last_saved = self.last_saved.lock().await;
        let value = self.source.current()?;
        let serialized = serde_json::to_string(&value)?;

        if last_saved.as_deref() == Some(serialized.as_str()) {
            return Ok(false);
        }

        // Remembered even if the write below fails; the next change retries.
        *last_saved = Some(serialized);
        self.store.put(&self.job_id, value).await?;
        Ok(true)
    }
}

struct Binding<E: ?Sized> {
    session: Arc<Session<E>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodically persists one job's form state while bound.
///
/// `bind` replaces any previous binding only after the old tick task has
/// fully stopped, so a stale timer can never write after a new binding starts.
pub struct AutoSaveController<E: ?Sized> {
    store: Arc<RecordStore<E>>,
    interval: Duration,
    binding: Option<Binding<E>>,
    /// Jobs whose last binding ended with no snapshot, i.e. discarded and not
    /// saved since. Their next binding starts without a baseline.
    unsaved: HashSet<String>,
}

impl<E: KeyValueEngine + ?Sized + 'static> AutoSaveController<E> {
    pub fn new(store: Arc<RecordStore<E>>, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_millis(1)),
            binding: None,
            unsaved: HashSet::new(),
        }
    }

    pub fn with_default_interval(store: Arc<RecordStore<E>>) -> Self {
        Self::new(store, DEFAULT_AUTOSAVE_INTERVAL)
    }

    /// Controller ticking at the configured `autosave.interval_ms`.
    pub fn from_config(store: Arc<RecordStore<E>>, config: &AutoSaveConfig) -> Self {
        Self::new(store, config.interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Job currently bound, if any.
    pub fn job_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.session.job_id.as_str())
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Start autosaving `source` as the draft of `job_id`.
    ///
    /// Any previous binding is cancelled first. An empty `job_id` or a `Null`
    /// source value leaves the controller idle and returns `false`. The value
    /// at bind time becomes the baseline, so binding alone never writes,
    /// unless the job's draft was discarded and not saved since; then the
    /// first tick or `save_now` writes the current value.
    pub async fn bind(
        &mut self,
        job_id: &str,
        source: Arc<dyn DraftSource>,
    ) -> Result<bool, StorageError> {
        self.unbind().await;

        if job_id.is_empty() {
            debug!("Autosave bind skipped: empty job id");
            return Ok(false);
        }

        let baseline = source.current()?;
        if baseline.is_null() {
            debug!(job_id, "Autosave bind skipped: no form data");
            return Ok(false);
        }

        let last_saved = if self.unsaved.remove(job_id) {
            None
        } else {
            Some(serde_json::to_string(&baseline)?)
        };
        let session = Arc::new(Session {
            job_id: job_id.to_string(),
            source,
            store: Arc::clone(&self.store),
            last_saved: Mutex::new(last_saved),
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_ticks(
            Arc::clone(&session),
            self.interval,
            cancel.clone(),
        ));

        info!(
            job_id,
            interval_ms = self.interval.as_millis() as u64,
            "Autosave bound"
        );
        self.binding = Some(Binding {
            session,
            cancel,
            task,
        });
        Ok(true)
    }

    /// Stop the tick task and wait until it has exited.
    ///
    /// A write already in flight completes; no further writes are issued.
    pub async fn unbind(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };

        binding.cancel.cancel();
        if let Err(e) = binding.task.await
            && e.is_panic()
        {
            warn!(job_id = %binding.session.job_id, "Autosave task panicked");
        }
        if binding.session.last_saved.lock().await.is_none() {
            self.unsaved.insert(binding.session.job_id.clone());
        }
        info!(job_id = %binding.session.job_id, "Autosave unbound");
    }

    /// Persist the bound form now if it changed since the last save.
    ///
    /// Returns whether a write was attempted. Write errors are returned.
    pub async fn save_now(&self) -> Result<bool, StorageError> {
        match &self.binding {
            Some(binding) => binding.session.save_if_changed().await,
            None => Ok(false),
        }
    }

    /// Stored draft of the bound job.
    pub async fn load(&self) -> Result<Option<Value>, StorageError> {
        match &self.binding {
            Some(binding) => self.store.get(&binding.session.job_id).await,
            None => Ok(None),
        }
    }

    /// Delete the bound job's draft and forget the remembered snapshot.
    ///
    /// With the snapshot cleared, the next tick or `save_now` writes the
    /// current form even if it equals what was discarded.
    pub async fn discard(&self) -> Result<(), StorageError> {
        let Some(binding) = &self.binding else {
            return Ok(());
        };

        let mut last_saved = binding.session.last_saved.lock().await;
        self.store.delete(&binding.session.job_id).await?;
        *last_saved = None;
        info!(job_id = %binding.session.job_id, "Discarded draft");
        Ok(())
    }
}

impl<E: ?Sized> Drop for AutoSaveController<E> {
    fn drop(&mut self) {
        if let Some(binding) = &self.binding {
            binding.cancel.cancel();
        }
    }
}

async fn run_ticks<E: KeyValueEngine + ?Sized>(
    session: Arc<Session<E>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => match session.save_if_changed().await {
                Ok(true) => debug!(job_id = %session.job_id, "Autosaved draft"),
                Ok(false) => {}
                Err(e) => warn!(job_id = %session.job_id, error = %e, "Autosave failed"),
            },
        }
    }
}
