//! The job catalog and its selection.
//!
//! [`JobCatalog`] owns the list of known jobs and the selected job id. A
//! refresh replaces the list wholesale; concurrent refreshes share one
//! outstanding fetch. Selection changes are delivered synchronously to
//! registered [`SelectionObserver`]s and then published on the
//! [`EventBus`].
//!
//! Every selection change is stamped with an epoch while the state lock is
//! held. Delivery drops a change older than the last one delivered, so a
//! refresh re-announcing job A can never land after a later `select(B)`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use mmm_client::JobService;
use mmm_core::error::ClientError;
use mmm_core::job::JobRecord;
use mmm_core::query::SlotKey;
use mmm_events::{EventBus, EventKind, SelectionChanged};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<Vec<JobRecord>>, ClientError>>>;

/// Errors from [`JobCatalog::select`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("Job {0} is not in the catalog")]
    UnknownJob(String),
}

/// Receives selection changes before they are published on the bus.
///
/// Called with the catalog's delivery lock held; implementations must not
/// call back into [`JobCatalog::select`].
pub trait SelectionObserver: Send + Sync {
    fn selection_changed(&self, change: &SelectionChanged);
}

/// Load state of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatus {
    Idle,
    Loading,
    Ready,
    /// The last refresh failed; the previous job list is kept.
    Failed(ClientError),
}

struct CatalogState {
    jobs: Arc<Vec<JobRecord>>,
    selected: Option<String>,
    status: CatalogStatus,
    /// Incremented for every refresh fetch actually issued.
    generation: u64,
    in_flight: Option<(u64, RefreshFuture)>,
    /// Incremented for every selection change.
    selection_epoch: u64,
}

/// Owns the job list and the current selection.
pub struct JobCatalog {
    service: Arc<dyn JobService>,
    events: Arc<EventBus>,
    state: Mutex<CatalogState>,
    observers: Mutex<Vec<Arc<dyn SelectionObserver>>>,
    /// Epoch of the last selection change handed to observers.
    delivered: Mutex<u64>,
}

impl JobCatalog {
    pub fn new(service: Arc<dyn JobService>, events: Arc<EventBus>) -> Self {
        Self {
            service,
            events,
            state: Mutex::new(CatalogState {
                jobs: Arc::new(Vec::new()),
                selected: None,
                status: CatalogStatus::Idle,
                generation: 0,
                in_flight: None,
                selection_epoch: 0,
            }),
            observers: Mutex::new(Vec::new()),
            delivered: Mutex::new(0),
        }
    }

    /// Key used to tag catalog refreshes in logs.
    pub fn key(&self) -> SlotKey {
        SlotKey::Catalog
    }

    pub fn add_observer(&self, observer: Arc<dyn SelectionObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Fetch the job list and replace the catalog with it.
    ///
    /// A call made while a refresh is outstanding joins that refresh
    /// instead of issuing another fetch; every joined caller receives the
    /// same result. On failure the previous job list is kept.
    pub async fn refresh(&self) -> Result<Arc<Vec<JobRecord>>, ClientError> {
        let (generation, fetch) = {
            let mut state = self.lock();
            match &state.in_flight {
                Some((generation, fetch)) => {
                    tracing::debug!(
                        slot = %SlotKey::Catalog,
                        generation,
                        "Joining outstanding catalog refresh",
                    );
                    (*generation, fetch.clone())
                }
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let service = Arc::clone(&self.service);
                    let fetch = async move { service.list_jobs().await.map(Arc::new) }
                        .boxed()
                        .shared();
                    state.in_flight = Some((generation, fetch.clone()));
                    state.status = CatalogStatus::Loading;
                    tracing::debug!(
                        slot = %SlotKey::Catalog,
                        generation,
                        "Refreshing job catalog",
                    );
                    (generation, fetch)
                }
            }
        };

        let outcome = fetch.await;
        self.settle_refresh(generation, &outcome);
        outcome
    }

    /// Change the selection. Selecting the current job again is a no-op;
    /// no network call is made either way.
    pub fn select(&self, job_id: Option<&str>) -> Result<(), SelectError> {
        let (change, epoch) = {
            let mut state = self.lock();
            if state.selected.as_deref() == job_id {
                return Ok(());
            }
            let current = match job_id {
                None => None,
                Some(id) => Some(
                    find(&state.jobs, id)
                        .cloned()
                        .ok_or_else(|| SelectError::UnknownJob(id.to_string()))?,
                ),
            };
            let previous = std::mem::replace(&mut state.selected, job_id.map(str::to_string));
            state.selection_epoch += 1;
            (SelectionChanged { previous, current }, state.selection_epoch)
        };

        tracing::info!(
            previous = ?change.previous,
            current = ?change.current_id(),
            "Job selection changed",
        );
        self.notify(change, epoch);
        Ok(())
    }

    /// The selected job's record from the latest job list.
    pub fn current_selection(&self) -> Option<JobRecord> {
        let state = self.lock();
        let id = state.selected.as_deref()?;
        find(&state.jobs, id).cloned()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    /// The job list in service order.
    pub fn jobs(&self) -> Arc<Vec<JobRecord>> {
        Arc::clone(&self.lock().jobs)
    }

    pub fn status(&self) -> CatalogStatus {
        self.lock().status.clone()
    }

    /// Refresh every `interval` until `cancel` fires. The first refresh
    /// happens immediately.
    pub fn spawn_auto_refresh(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let catalog = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Starting catalog auto-refresh");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Catalog auto-refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Failures are logged and recorded in the catalog status.
                        let _ = catalog.refresh().await;
                    }
                }
            }
        })
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the outcome of refresh `generation`. Only the first caller
    /// for the outstanding generation applies it.
    fn settle_refresh(&self, generation: u64, outcome: &Result<Arc<Vec<JobRecord>>, ClientError>) {
        let mut state = self.lock();
        match &state.in_flight {
            Some((in_flight, _)) if *in_flight == generation => {}
            _ => return,
        }
        state.in_flight = None;

        let jobs = match outcome {
            Ok(jobs) => Arc::clone(jobs),
            Err(err) => {
                state.status = CatalogStatus::Failed(err.clone());
                drop(state);
                tracing::warn!(
                    slot = %SlotKey::Catalog,
                    generation,
                    error = %err,
                    "Job catalog refresh failed",
                );
                self.events.publish(EventKind::CatalogRefreshFailed {
                    error: err.to_string(),
                });
                return;
            }
        };

        let change = state.selected.clone().and_then(|id| {
            let before = find(&state.jobs, &id).map(|job| job.job_status.clone());
            match find(&jobs, &id) {
                Some(job) if before.as_ref() != Some(&job.job_status) => Some(SelectionChanged {
                    previous: Some(id),
                    current: Some(job.clone()),
                }),
                Some(_) => None,
                None => Some(SelectionChanged {
                    previous: Some(id),
                    current: None,
                }),
            }
        });
        if matches!(&change, Some(SelectionChanged { current: None, .. })) {
            state.selected = None;
        }
        let change = change.map(|change| {
            state.selection_epoch += 1;
            (change, state.selection_epoch)
        });
        state.jobs = Arc::clone(&jobs);
        state.status = CatalogStatus::Ready;
        drop(state);

        tracing::info!(
            slot = %SlotKey::Catalog,
            generation,
            job_count = jobs.len(),
            "Job catalog refreshed",
        );
        self.events.publish(EventKind::CatalogRefreshed {
            job_count: jobs.len(),
        });

        if let Some((change, epoch)) = change {
            match &change.current {
                Some(job) => tracing::info!(
                    job_id = %job.job_id,
                    status = %job.job_status,
                    "Selected job changed status",
                ),
                None => tracing::info!(
                    previous = ?change.previous,
                    "Selected job is no longer listed; clearing selection",
                ),
            }
            self.notify(change, epoch);
        }
    }

    /// Deliver selection change `epoch` unless a newer one already went out.
    fn notify(&self, change: SelectionChanged, epoch: u64) {
        let mut delivered = self.delivered.lock().unwrap_or_else(|e| e.into_inner());
        if epoch <= *delivered {
            tracing::debug!(epoch, delivered = *delivered, "Dropping superseded selection change");
            return;
        }
        *delivered = epoch;

        let observers = self
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in observers {
            observer.selection_changed(&change);
        }
        self.events.publish(EventKind::SelectionChanged(change));
    }
}

fn find<'a>(jobs: &'a [JobRecord], job_id: &str) -> Option<&'a JobRecord> {
    jobs.iter().find(|job| job.job_id == job_id)
}
