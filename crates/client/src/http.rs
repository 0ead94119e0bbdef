//! HTTP implementation of [`JobService`].
//!
//! Every request carries the bearer token from the configured
//! [`AuthProvider`] and is bounded by a per-request timeout covering both
//! the round trip and reading the body.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mmm_core::error::{AuthError, ClientError, NetworkError};
use mmm_core::form::JobSubmission;
use mmm_core::job::{JobList, JobRecord};
use mmm_core::payload::{BudgetPayload, GraphPayload, GraphType};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::auth::AuthProvider;
use crate::config::{ClientConfig, Endpoint};
use crate::decode::{decode, decode_value};
use crate::service::JobService;

/// HTTP client for the job service.
pub struct HttpJobService {
    client: reqwest::Client,
    endpoint: Endpoint,
    auth: Arc<dyn AuthProvider>,
    timeout: Duration,
}

impl HttpJobService {
    /// Create a client for `endpoint` with its own connection pool.
    pub fn new(endpoint: Endpoint, auth: Arc<dyn AuthProvider>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, auth, timeout)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        endpoint: Endpoint,
        auth: Arc<dyn AuthProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            auth,
            timeout,
        }
    }

    pub fn from_config(config: &ClientConfig, auth: Arc<dyn AuthProvider>) -> Self {
        Self::new(config.endpoint.clone(), auth, config.request_timeout)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ---- private helpers ----

    /// Attach the bearer token, send, and read the body within the
    /// timeout.
    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let token = self.auth.token().await?;
        let request = request.bearer_auth(token.as_str());

        let exchange = async {
            let response = request.send().await.map_err(classify)?;
            let response = ensure_success(response).await?;
            let body = response.bytes().await.map_err(classify)?;
            Ok::<_, ClientError>(body.to_vec())
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(self.timeout).into()),
        }
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ClientError> {
        let url = self.endpoint.url(&["frontend", "jobs"]);
        tracing::debug!(url = %url, "Listing jobs");
        let body = self.execute(self.client.get(url)).await?;
        Ok(decode::<JobList>(&body)?.items)
    }

    async fn list_tables(&self) -> Result<Vec<String>, ClientError> {
        let url = self.endpoint.url(&["frontend", "tables"]);
        tracing::debug!(url = %url, "Listing tables");
        let body = self.execute(self.client.get(url)).await?;
        decode(&body)
    }

    async fn submit_job(&self, job: &JobSubmission) -> Result<(), ClientError> {
        let url = self.endpoint.url(&["frontend", "jobs"]);
        tracing::debug!(url = %url, job_name = %job.job_name, "Submitting job");
        self.execute(self.client.put(url).json(job)).await?;
        Ok(())
    }

    async fn fetch_graph(&self, job_id: &str, graph: GraphType) -> Result<GraphPayload, ClientError> {
        let url = self.endpoint.url(&["frontend", "jobs", job_id, "graph"]);
        tracing::debug!(url = %url, graph_type = %graph, "Fetching graph");
        let request = self.client.get(url).query(&[("graph_type", graph.as_str())]);
        let body = self.execute(request).await?;
        Ok(graph.decode(decode_value(&body)?)?)
    }

    async fn optimize_budget(&self, job_id: &str, budget: u32) -> Result<BudgetPayload, ClientError> {
        let url = self.endpoint.url(&["backend", "budget"]);
        tracing::debug!(url = %url, job_id, budget, "Requesting budget optimization");
        let budget = budget.to_string();
        let request = self
            .client
            .get(url)
            .query(&[("job_id", job_id), ("budget", budget.as_str())]);
        let body = self.execute(request).await?;
        decode(&body)
    }
}

/// Map a non-2xx response to the error taxonomy. 401 and 403 mean the
/// token was refused.
async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    tracing::warn!(status = status.as_u16(), "Job service returned an error status");

    let code = status.as_u16();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthError::Rejected { status: code, body }.into()
        }
        _ => NetworkError::Status { status: code, body }.into(),
    })
}

fn classify(err: reqwest::Error) -> ClientError {
    if err.is_decode() {
        ClientError::Decode(err.to_string())
    } else {
        NetworkError::Transport(err.to_string()).into()
    }
}
