//! The operations the explorer consumes from the remote service.

use async_trait::async_trait;
use mmm_core::error::ClientError;
use mmm_core::form::JobSubmission;
use mmm_core::job::JobRecord;
use mmm_core::payload::{BudgetPayload, GraphPayload, GraphType};

/// Remote job service.
///
/// Implemented over HTTP by [`HttpJobService`](crate::http::HttpJobService);
/// tests substitute scripted implementations.
#[async_trait]
pub trait JobService: Send + Sync {
    /// `GET /frontend/jobs`
    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ClientError>;

    /// `GET /frontend/tables`
    async fn list_tables(&self) -> Result<Vec<String>, ClientError>;

    /// `PUT /frontend/jobs`
    async fn submit_job(&self, job: &JobSubmission) -> Result<(), ClientError>;

    /// `GET /frontend/jobs/{job_id}/graph?graph_type=...`
    async fn fetch_graph(&self, job_id: &str, graph: GraphType) -> Result<GraphPayload, ClientError>;

    /// `GET /backend/budget?job_id=...&budget=...`
    async fn optimize_budget(&self, job_id: &str, budget: u32) -> Result<BudgetPayload, ClientError>;
}
