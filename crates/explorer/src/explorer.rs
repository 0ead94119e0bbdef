use std::sync::Arc;
use std::time::Duration;

use mmm_client::JobService;
use mmm_core::error::{ClientError, ValidationError};
use mmm_core::job::JobRecord;
use mmm_events::{EventBus, ExplorerEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::{JobCatalog, SelectError};
use crate::derived::{BudgetControl, BudgetSlot, ChartSlot, DerivedSlots};
use crate::slot::IssueOutcome;
use crate::submission::JobSubmissionFlow;

/// Entry point wiring the catalog, the derived slots and job submission
/// to one job service and one event bus.
///
/// The catalog's selection is the only input to the chart slots: selecting
/// a completed job loads both charts, selecting anything else leaves them
/// idle. The budget slot additionally waits for [`optimize`](Self::optimize).
pub struct Explorer {
    catalog: Arc<JobCatalog>,
    derived: Arc<DerivedSlots>,
    submission: JobSubmissionFlow,
    events: Arc<EventBus>,
}

impl Explorer {
    pub fn new(service: Arc<dyn JobService>) -> Self {
        Self::with_events(service, Arc::new(EventBus::default()))
    }

    pub fn with_events(service: Arc<dyn JobService>, events: Arc<EventBus>) -> Self {
        let catalog = Arc::new(JobCatalog::new(Arc::clone(&service), Arc::clone(&events)));
        let derived = Arc::new(DerivedSlots::new(Arc::clone(&service), Arc::clone(&events)));
        catalog.add_observer(derived.clone());
        let submission = JobSubmissionFlow::new(service, Arc::clone(&events));
        Self {
            catalog,
            derived,
            submission,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ---- catalog ----

    pub fn catalog(&self) -> &Arc<JobCatalog> {
        &self.catalog
    }

    pub async fn refresh(&self) -> Result<Arc<Vec<JobRecord>>, ClientError> {
        self.catalog.refresh().await
    }

    pub fn select(&self, job_id: Option<&str>) -> Result<(), SelectError> {
        self.catalog.select(job_id)
    }

    pub fn current_selection(&self) -> Option<JobRecord> {
        self.catalog.current_selection()
    }

    pub fn spawn_auto_refresh(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        self.catalog.spawn_auto_refresh(interval, cancel)
    }

    // ---- derived queries ----

    pub fn attribution(&self) -> &ChartSlot {
        self.derived.attribution()
    }

    pub fn media_metrics(&self) -> &ChartSlot {
        self.derived.media_metrics()
    }

    pub fn budget(&self) -> &BudgetSlot {
        self.derived.budget()
    }

    pub fn budget_control(&self) -> BudgetControl {
        self.derived.budget_control()
    }

    pub fn set_budget(&self, amount: u32) -> Result<(), ValidationError> {
        self.derived.set_budget(amount)
    }

    /// Commit the staged budget and optimize it for the selected job.
    pub fn optimize(&self) -> IssueOutcome {
        self.derived.optimize(self.catalog.current_selection().as_ref())
    }

    /// Refetch both charts for the selected job.
    pub fn retry_charts(&self) {
        self.derived.retry_charts(self.catalog.current_selection().as_ref())
    }

    // ---- submission ----

    pub fn submission(&self) -> &JobSubmissionFlow {
        &self.submission
    }
}
