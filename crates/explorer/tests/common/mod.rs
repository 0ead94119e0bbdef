//! Shared test harness: a job service whose calls park until the test
//! answers them, in whatever order the test chooses.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mmm_client::JobService;
use mmm_core::error::{ClientError, NetworkError};
use mmm_core::form::JobSubmission;
use mmm_core::job::JobRecord;
use mmm_core::payload::{BudgetPayload, GraphPayload, GraphType};
use mmm_explorer::Explorer;
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// A call the explorer made against the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListJobs,
    ListTables,
    SubmitJob(JobSubmission),
    FetchGraph { job_id: String, graph: GraphType },
    OptimizeBudget { job_id: String, budget: u32 },
}

impl Call {
    pub fn graph(job_id: &str, graph: GraphType) -> Self {
        Self::FetchGraph {
            job_id: job_id.into(),
            graph,
        }
    }

    pub fn budget(job_id: &str, budget: u32) -> Self {
        Self::OptimizeBudget {
            job_id: job_id.into(),
            budget,
        }
    }

    pub fn is_graph(&self) -> bool {
        matches!(self, Self::FetchGraph { .. })
    }

    pub fn is_budget(&self) -> bool {
        matches!(self, Self::OptimizeBudget { .. })
    }
}

struct Parked {
    call: Call,
    reply: oneshot::Sender<Result<Value, ClientError>>,
}

/// Records every call and parks it until answered with a JSON body or an
/// error.
#[derive(Default)]
pub struct ScriptedService {
    history: Mutex<Vec<Call>>,
    parked: Mutex<Vec<Parked>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.history.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.history.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Calls still waiting for an answer, oldest first.
    pub fn parked(&self) -> Vec<Call> {
        self.parked
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.call.clone())
            .collect()
    }

    /// Answer the oldest parked `call`. Returns whether the caller was
    /// still listening.
    pub fn answer(&self, call: &Call, reply: Result<Value, ClientError>) -> bool {
        let parked = {
            let mut parked = self.parked.lock().unwrap();
            let index = parked
                .iter()
                .position(|p| &p.call == call)
                .unwrap_or_else(|| panic!("no parked call {call:?}"));
            parked.remove(index)
        };
        parked.reply.send(reply).is_ok()
    }

    async fn park(&self, call: Call) -> Result<Value, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.history.lock().unwrap().push(call.clone());
        self.parked.lock().unwrap().push(Parked { call, reply: tx });
        rx.await
            .unwrap_or_else(|_| Err(NetworkError::Transport("reply dropped".into()).into()))
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ClientError> {
        let body = self.park(Call::ListJobs).await?;
        Ok(serde_json::from_value(body["items"].clone())?)
    }

    async fn list_tables(&self) -> Result<Vec<String>, ClientError> {
        let body = self.park(Call::ListTables).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn submit_job(&self, job: &JobSubmission) -> Result<(), ClientError> {
        self.park(Call::SubmitJob(job.clone())).await?;
        Ok(())
    }

    async fn fetch_graph(&self, job_id: &str, graph: GraphType) -> Result<GraphPayload, ClientError> {
        let body = self.park(Call::graph(job_id, graph)).await?;
        Ok(graph.decode(body)?)
    }

    async fn optimize_budget(&self, job_id: &str, budget: u32) -> Result<BudgetPayload, ClientError> {
        let body = self.park(Call::budget(job_id, budget)).await?;
        Ok(serde_json::from_value(body)?)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn job_json(job_id: &str, status: &str) -> Value {
    json!({
        "job_id": job_id,
        "job_name": format!("model {job_id}"),
        "req_media_table": "media_weekly",
        "req_kpi_table": "kpi_sales",
        "req_cost_table": "cost_weekly",
        "req_feature_table": "feature_macro",
        "req_number_warmup": "1000",
        "req_number_samples": "1000",
        "req_number_chains": "2",
        "req_compute_type": "CPU",
        "req_compute_cores": "16",
        "job_status": status,
    })
}

pub fn jobs_body(jobs: &[(&str, &str)]) -> Value {
    let items: Vec<Value> = jobs.iter().map(|(id, status)| job_json(id, status)).collect();
    json!({ "items": items })
}

/// Attribution payload whose first series is named `label`.
pub fn attribution_body(label: &str) -> Value {
    json!([
        { "id": label, "data": [{ "x": "period_0", "y": 1.0 }] },
        { "id": "baseline", "data": [{ "x": "period_0", "y": 4.0 }] }
    ])
}

/// Media-metrics payload whose single bar is named `label`.
pub fn media_body(label: &str) -> Value {
    json!([{ "x": label, "y": 0.3, "errorX": 0, "errorY": 0.02 }])
}

pub fn budget_body() -> Value {
    json!({
        "graph1": [
            { "id": "optimal_budget_allocation", "data": [{ "x": "tv", "y": 600.0, "y1_label": 0.6 }] },
            { "id": "previous_budget_allocation", "data": [{ "x": "tv", "y": 500.0, "y1_label": 0.5 }] }
        ],
        "graph2": { "data": [
            { "x": "Pre optimization \n predicted target", "y": 1000 },
            { "x": "Post optimization \n predicted target", "y": 1150 }
        ] }
    })
}

/// Let spawned fetches run until they park or settle.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Refresh `explorer` against `service`, answering with `jobs`.
pub async fn load_jobs(explorer: &Arc<Explorer>, service: &ScriptedService, jobs: &[(&str, &str)]) {
    let refresh = tokio::spawn({
        let explorer = Arc::clone(explorer);
        async move { explorer.refresh().await }
    });
    settle().await;
    assert!(service.answer(&Call::ListJobs, Ok(jobs_body(jobs))));
    refresh.await.unwrap().unwrap();
}
