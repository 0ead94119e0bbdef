//! Derived-analytics slots fed by the catalog's selection.
//!
//! Two chart slots follow the selection automatically. The budget slot
//! only fetches on an explicit optimize, using the committed budget rather
//! than the value the slider currently shows.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use mmm_client::JobService;
use mmm_core::budget::{validate_budget, DEFAULT_BUDGET};
use mmm_core::error::ValidationError;
use mmm_core::job::JobRecord;
use mmm_core::payload::{BudgetPayload, GraphPayload, GraphType};
use mmm_core::query::{QueryRequest, SlotKey};
use mmm_events::{EventBus, SelectionChanged};

use crate::catalog::SelectionObserver;
use crate::slot::{Fetcher, IssueOutcome, QuerySlot};

pub type ChartSlot = QuerySlot<GraphType, GraphPayload>;
pub type BudgetSlot = QuerySlot<u32, BudgetPayload>;

/// Staged and committed budget amounts.
///
/// The display value follows the slider; only [`commit`](Self::commit)
/// turns it into the amount a budget request is formed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetControl {
    display: u32,
    committed: Option<u32>,
}

impl Default for BudgetControl {
    fn default() -> Self {
        Self {
            display: DEFAULT_BUDGET,
            committed: None,
        }
    }
}

impl BudgetControl {
    pub fn display(&self) -> u32 {
        self.display
    }

    pub fn committed(&self) -> Option<u32> {
        self.committed
    }

    /// Move the slider. Out-of-range amounts are rejected and the display
    /// value is left as it was.
    pub fn set_display(&mut self, amount: u32) -> Result<(), ValidationError> {
        self.display = validate_budget(amount)?;
        Ok(())
    }

    pub fn commit(&mut self) -> u32 {
        self.committed = Some(self.display);
        self.display
    }

    pub fn clear_commit(&mut self) {
        self.committed = None;
    }
}

/// The three query slots derived from the selected job.
pub struct DerivedSlots {
    attribution: ChartSlot,
    media_metrics: ChartSlot,
    budget: BudgetSlot,
    control: Mutex<BudgetControl>,
}

impl DerivedSlots {
    pub fn new(service: Arc<dyn JobService>, events: Arc<EventBus>) -> Self {
        Self {
            attribution: QuerySlot::with_events(
                SlotKey::Attribution,
                graph_fetcher(Arc::clone(&service)),
                Arc::clone(&events),
            ),
            media_metrics: QuerySlot::with_events(
                SlotKey::MediaMetrics,
                graph_fetcher(Arc::clone(&service)),
                Arc::clone(&events),
            ),
            budget: QuerySlot::with_events(SlotKey::Budget, budget_fetcher(service), events),
            control: Mutex::new(BudgetControl::default()),
        }
    }

    pub fn attribution(&self) -> &ChartSlot {
        &self.attribution
    }

    pub fn media_metrics(&self) -> &ChartSlot {
        &self.media_metrics
    }

    pub fn budget(&self) -> &BudgetSlot {
        &self.budget
    }

    pub fn budget_control(&self) -> BudgetControl {
        *self.control()
    }

    /// Stage a budget amount without fetching.
    pub fn set_budget(&self, amount: u32) -> Result<(), ValidationError> {
        self.control().set_display(amount)
    }

    /// Commit the staged budget and request an optimization for
    /// `selection`. Without a completed selection the budget slot is reset.
    pub fn optimize(&self, selection: Option<&JobRecord>) -> IssueOutcome {
        let Some(job) = selection.filter(|job| job.is_completed()) else {
            self.control().clear_commit();
            self.budget.reset();
            return IssueOutcome::Gated;
        };
        let amount = self.control().commit();
        tracing::info!(job_id = %job.job_id, budget = amount, "Budget optimization requested");
        self.budget
            .request(QueryRequest::new(SlotKey::Budget, job.job_id.clone(), amount))
    }

    /// Refetch both charts for `selection`, including ones already loaded.
    pub fn retry_charts(&self, selection: Option<&JobRecord>) {
        match selection.filter(|job| job.is_completed()) {
            Some(job) => {
                for (slot, graph) in self.charts() {
                    slot.reload(chart_request(slot, job, graph));
                }
            }
            None => {
                self.attribution.reset();
                self.media_metrics.reset();
            }
        }
    }

    // ---- private helpers ----

    fn control(&self) -> MutexGuard<'_, BudgetControl> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn charts(&self) -> [(&ChartSlot, GraphType); 2] {
        [
            (&self.attribution, GraphType::AttributionArea),
            (&self.media_metrics, GraphType::MediaMetrics),
        ]
    }

    fn follow(&self, current: Option<&JobRecord>) {
        // Budget results belong to one job and one committed amount.
        self.budget.reset();
        self.control().clear_commit();

        match current {
            Some(job) => {
                let completed = job.is_completed();
                for (slot, graph) in self.charts() {
                    slot.request_if(chart_request(slot, job, graph), completed);
                }
            }
            None => {
                self.attribution.reset();
                self.media_metrics.reset();
            }
        }
    }
}

impl SelectionObserver for DerivedSlots {
    fn selection_changed(&self, change: &SelectionChanged) {
        self.follow(change.current.as_ref());
    }
}

fn chart_request(slot: &ChartSlot, job: &JobRecord, graph: GraphType) -> QueryRequest<GraphType> {
    QueryRequest::new(slot.key(), job.job_id.clone(), graph)
}

fn graph_fetcher(service: Arc<dyn JobService>) -> Fetcher<GraphType, GraphPayload> {
    Arc::new(move |request: QueryRequest<GraphType>| {
        let service = Arc::clone(&service);
        async move { service.fetch_graph(&request.job_id, request.params).await }.boxed()
    })
}

fn budget_fetcher(service: Arc<dyn JobService>) -> Fetcher<u32, BudgetPayload> {
    Arc::new(move |request: QueryRequest<u32>| {
        let service = Arc::clone(&service);
        async move { service.optimize_budget(&request.job_id, request.params).await }.boxed()
    })
}
